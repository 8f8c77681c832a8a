// Gateway stub with scripted answers

use async_trait::async_trait;
use rust_decimal::Decimal;
use staypay::modules::gateways::{
    GatewayError, InitializeRequest, InitializeResponse, PaymentGateway, VerifyResponse,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Initialize succeeds unless a failure is queued; verify answers with
/// whatever was last scripted (default `pending`).
pub struct ScriptedGateway {
    initialize_failures: Mutex<VecDeque<GatewayError>>,
    verify_answer: Mutex<Result<String, GatewayError>>,
    verify_amount: Mutex<Option<Decimal>>,
    verify_reference: Mutex<Option<String>>,
    pub initialize_requests: Mutex<Vec<InitializeRequest>>,
    initialize_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            initialize_failures: Mutex::new(VecDeque::new()),
            verify_answer: Mutex::new(Ok("pending".to_string())),
            verify_amount: Mutex::new(None),
            verify_reference: Mutex::new(None),
            initialize_requests: Mutex::new(Vec::new()),
            initialize_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_initialize(&self, error: GatewayError) {
        self.initialize_failures.lock().unwrap().push_back(error);
    }

    pub fn answer_verify(&self, remote_status: &str) {
        *self.verify_answer.lock().unwrap() = Ok(remote_status.to_string());
    }

    pub fn fail_verify(&self, error: GatewayError) {
        *self.verify_answer.lock().unwrap() = Err(error);
    }

    pub fn report_amount(&self, amount: Decimal) {
        *self.verify_amount.lock().unwrap() = Some(amount);
    }

    /// Gateway's own transaction id in verify replies (default: the asked reference)
    pub fn report_reference(&self, reference: &str) {
        *self.verify_reference.lock().unwrap() = Some(reference.to_string());
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializeResponse, GatewayError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        let tx_ref = request.tx_ref.clone();
        self.initialize_requests.lock().unwrap().push(request);

        if let Some(error) = self.initialize_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(InitializeResponse {
            checkout_url: format!("https://checkout.chapa.co/checkout/payment/{}", tx_ref),
            gateway_reference: tx_ref,
            remote_status: "success".to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifyResponse, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let remote_status = self.verify_answer.lock().unwrap().clone()?;
        let amount = self.verify_amount.lock().unwrap().unwrap_or(Decimal::ZERO);

        Ok(VerifyResponse {
            remote_status,
            amount,
            currency: "ETB".to_string(),
            gateway_reference: self
                .verify_reference
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| reference.to_string()),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
