pub mod services;

pub use services::{
    compute_signature, normalize_status, verify_signature, ChapaClient, GatewayError,
    InitializeRequest, InitializeResponse, PaymentGateway, VerifyResponse,
};
