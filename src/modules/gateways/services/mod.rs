pub mod chapa;
pub mod gateway_trait;
pub mod webhook_signature;

pub use chapa::ChapaClient;
pub use gateway_trait::{
    normalize_status, GatewayError, InitializeRequest, InitializeResponse, PaymentGateway,
    VerifyResponse,
};
pub use webhook_signature::{compute_signature, verify_signature};
