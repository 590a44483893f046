pub mod certificate;
pub mod verifier;

pub use certificate::{CertificateLoader, ClientCertificate};
pub use verifier::{AcceptAnyServerCert, insecure_client_config};
