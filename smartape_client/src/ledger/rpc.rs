use super::{
    ContractCreateTransaction, ContractExecuteTransaction, FileAppendTransaction,
    FileCreateTransaction, LedgerClient, TransactionId, TransactionReceipt, TransactionRecord,
};
use crate::config::Operator;
use crate::error::TransportError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Ledger gateway client speaking JSON-RPC 2.0 over HTTP.
///
/// Each request body is signed with the operator's Ed25519 key; the
/// signature covers the compact JSON encoding of `params.body`.
pub struct RpcLedgerClient {
    client: Client,
    endpoint: Url,
    operator: Operator,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: SignedParams,
}

#[derive(Debug, Serialize)]
struct SignedParams {
    operator: OperatorSignature,
    body: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OperatorSignature {
    account_id: String,
    public_key: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct RecordQuery<'a> {
    transaction_id: &'a TransactionId,
}

impl RpcLedgerClient {
    pub fn new(endpoint: &str, operator: Operator, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TransportError::Malformed(format!("gateway endpoint {}: {}", endpoint, e)))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            operator,
            next_id: AtomicU64::new(1),
        })
    }

    /// Get the gateway URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn sign<B: Serialize>(&self, body: &B) -> Result<SignedParams, TransportError> {
        let body = serde_json::to_value(body)
            .map_err(|e| TransportError::Malformed(format!("encoding request: {}", e)))?;
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| TransportError::Malformed(format!("encoding request: {}", e)))?;
        let signature = self.operator.key.sign(&bytes);

        Ok(SignedParams {
            operator: OperatorSignature {
                account_id: self.operator.account_id.to_string(),
                public_key: self.operator.key.public_key_hex(),
                signature: hex::encode(signature.to_bytes()),
            },
            body,
        })
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: self.sign(body)?,
        };
        debug!("gateway call {} (id {})", method, request.id);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // the body may still carry a JSON-RPC error object
            let detail = response
                .bytes()
                .await
                .ok()
                .and_then(|body| serde_json::from_slice::<RpcResponse<serde_json::Value>>(&body).ok())
                .and_then(|body| body.error);
            return Err(match detail {
                Some(err) => TransportError::Rpc {
                    code: err.code,
                    message: err.message,
                },
                None => TransportError::Status(status.as_u16()),
            });
        }

        let response: RpcResponse<R> = response.json().await?;
        match (response.result, response.error) {
            (_, Some(err)) => Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(TransportError::Malformed(format!(
                "{} returned neither result nor error",
                method
            ))),
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn create_file(
        &self,
        tx: &FileCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        self.call("file_create", tx).await
    }

    async fn append_file(
        &self,
        tx: &FileAppendTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        self.call("file_append", tx).await
    }

    async fn create_contract(
        &self,
        tx: &ContractCreateTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        self.call("contract_create", tx).await
    }

    async fn execute_contract(
        &self,
        tx: &ContractExecuteTransaction,
    ) -> Result<TransactionReceipt, TransportError> {
        self.call("contract_execute", tx).await
    }

    async fn get_record(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, TransportError> {
        self.call("transaction_record", &RecordQuery { transaction_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorKey;
    use crate::ledger::{AccountId, ContractId, EntityId, FileId, Hbar};
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    type Received = Arc<Mutex<Vec<Value>>>;

    /// Serve a fixed reply on a local port, recording every request body
    async fn gateway(status: StatusCode, reply: Value) -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route(
                "/rpc",
                post(
                    move |State(received): State<Received>, Json(request): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            received.lock().push(request);
                            (status, Json(reply))
                        }
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{}/rpc", addr), received)
    }

    fn client(endpoint: &str) -> RpcLedgerClient {
        RpcLedgerClient::new(endpoint, operator(), Duration::from_secs(5)).unwrap()
    }

    fn append_tx() -> FileAppendTransaction {
        FileAppendTransaction {
            file_id: FileId(EntityId::new(0, 0, 77)),
            contents: b"6080".to_vec(),
            max_transaction_fee: Hbar::from_hbars(2),
        }
    }

    fn operator() -> Operator {
        Operator {
            account_id: AccountId(EntityId::new(0, 0, 1234)),
            key: OperatorKey::from_hex(
                "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let result = RpcLedgerClient::new("not a url", operator(), Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::Malformed(_))));
    }

    #[test]
    fn test_signed_params_verify_against_body() {
        let client =
            RpcLedgerClient::new("http://127.0.0.1:7546", operator(), Duration::from_secs(1))
                .unwrap();
        let tx = FileAppendTransaction {
            file_id: FileId(EntityId::new(0, 0, 77)),
            contents: b"6080".to_vec(),
            max_transaction_fee: Hbar::from_hbars(2),
        };
        let params = client.sign(&tx).unwrap();
        assert_eq!(params.operator.account_id, "0.0.1234");
        assert_eq!(params.body["file_id"], "0.0.77");

        let key_bytes: [u8; 32] = hex::decode(&params.operator.public_key)
            .unwrap()
            .try_into()
            .unwrap();
        let sig_bytes: [u8; 64] = hex::decode(&params.operator.signature)
            .unwrap()
            .try_into()
            .unwrap();
        let key = VerifyingKey::from_bytes(&key_bytes).unwrap();
        let message = serde_json::to_vec(&params.body).unwrap();
        assert!(key
            .verify(&message, &Signature::from_bytes(&sig_bytes))
            .is_ok());
    }

    #[test]
    fn test_response_parsing() {
        let ok: RpcResponse<TransactionReceipt> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{"transaction_id":"0.0.2@1.2","status":"SUCCESS","file_id":"0.0.5"}}"#,
        )
        .unwrap();
        let receipt = ok.result.unwrap();
        assert_eq!(receipt.file_id, Some(FileId(EntityId::new(0, 0, 5))));
        assert!(receipt.contract_id.is_none());

        let err: RpcResponse<TransactionReceipt> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid signature"}}"#,
        )
        .unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().message, "invalid signature");
    }

    #[tokio::test]
    async fn test_call_posts_signed_envelope() {
        let (endpoint, received) = gateway(
            StatusCode::OK,
            json!({"jsonrpc": "2.0", "id": 1, "result": {"transaction_id": "0.0.1234@1.5", "status": "SUCCESS"}}),
        )
        .await;
        let client = client(&endpoint);

        let receipt = client.append_file(&append_tx()).await.unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.transaction_id.to_string(), "0.0.1234@1.5");

        let requests = received.lock();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], "file_append");
        assert_eq!(request["id"], 1);
        assert_eq!(request["params"]["operator"]["account_id"], "0.0.1234");
        assert_eq!(request["params"]["body"]["file_id"], "0.0.77");
        assert_eq!(request["params"]["body"]["contents"], hex::encode(b"6080"));
        assert_eq!(request["params"]["operator"]["signature"].as_str().unwrap().len(), 128);
    }

    #[tokio::test]
    async fn test_record_query_returns_function_result() {
        let (endpoint, received) = gateway(
            StatusCode::OK,
            json!({"jsonrpc": "2.0", "id": 1, "result": {
                "receipt": {"transaction_id": "0.0.1234@1.6", "status": "SUCCESS"},
                "contract_function_result": {
                    "contract_id": "0.0.900",
                    "bytes": "00000000000000000000000000000000000000000000000000000000000007ce",
                    "gas_used": 2100,
                    "error_message": null
                }
            }}),
        )
        .await;
        let client = client(&endpoint);

        let record = client
            .get_record(&TransactionId("0.0.1234@1.6".to_string()))
            .await
            .unwrap();
        let result = record.contract_function_result.unwrap();
        assert_eq!(result.contract_id, Some(ContractId(EntityId::new(0, 0, 900))));
        assert_eq!(result.get_int32(0).unwrap(), 1998);

        let requests = received.lock();
        assert_eq!(requests[0]["method"], "transaction_record");
        assert_eq!(requests[0]["params"]["body"]["transaction_id"], "0.0.1234@1.6");
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_mapped() {
        let (endpoint, _) = gateway(
            StatusCode::OK,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "invalid signature"}}),
        )
        .await;
        let err = client(&endpoint).append_file(&append_tx()).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Rpc { code: -32602, ref message } if message == "invalid signature"
        ));
    }

    #[tokio::test]
    async fn test_empty_response_is_malformed() {
        let (endpoint, _) = gateway(StatusCode::OK, json!({"jsonrpc": "2.0", "id": 1})).await;
        let err = client(&endpoint).append_file(&append_tx()).await.unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_http_error_status_is_mapped() {
        let (endpoint, _) = gateway(StatusCode::SERVICE_UNAVAILABLE, json!("busy")).await;
        let err = client(&endpoint).append_file(&append_tx()).await.unwrap_err();
        assert!(matches!(err, TransportError::Status(503)));
    }

    #[tokio::test]
    async fn test_http_error_keeps_rpc_detail() {
        let (endpoint, _) = gateway(
            StatusCode::BAD_REQUEST,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "INSUFFICIENT_PAYER_BALANCE"}}),
        )
        .await;
        let err = client(&endpoint).append_file(&append_tx()).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Rpc { code: -32000, ref message } if message == "INSUFFICIENT_PAYER_BALANCE"
        ));
    }
}
