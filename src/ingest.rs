//! Request data ingestion strategies.
//!
//! A transport decodes bodies through one [`DataReader`]; handlers reach it
//! with `read_data::<T>()` on their request.
//!
//! # Design Decisions
//! - JSON bodies are handed over as raw bytes and decoded straight into the
//!   target type, so integers outside the 64-bit range survive
//! - Formats without a serde deserializer of their own build a value tree

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::transport::form::collect;
use crate::transport::Request;

/// Request body content produced by a [`DataReader`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON text, not yet decoded.
    Json(Bytes),
    /// Value tree built by the reader.
    Tree(Value),
}

impl Payload {
    /// Decodes into `T`; malformed input yields [`Error::Decode`].
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Json(bytes) => serde_json::from_slice(&bytes).map_err(Error::decode),
            Payload::Tree(value) => serde_json::from_value(value).map_err(Error::decode),
        }
    }
}

/// Reads a request body for decoding.
pub trait DataReader: Send + Sync + 'static {
    fn read<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, Result<Payload>>;
}

/// Decodes the body as JSON. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl DataReader for JsonReader {
    fn read<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, Result<Payload>> {
        Box::pin(async move { Ok(Payload::Json(collect(req.body()).await?)) })
    }
}

/// Decodes url-encoded forms; repeated keys become arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormReader;

impl DataReader for FormReader {
    fn read<'a>(&'a self, req: &'a mut dyn Request) -> BoxFuture<'a, Result<Payload>> {
        Box::pin(async move {
            let values = req.urlencoded_form().await?;
            let object: Map<String, Value> = values
                .iter()
                .map(|(key, all)| {
                    let value = match all {
                        [single] => Value::String(single.clone()),
                        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                    };
                    (key.to_owned(), value)
                })
                .collect();
            Ok(Payload::Tree(Value::Object(object)))
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde::Deserialize;

    use super::*;
    use crate::transport::mock::MockRequest;

    #[tokio::test]
    async fn test_json_reader_rejects_empty_body() {
        let mut req = MockRequest::new(Method::POST, "/");
        let payload = JsonReader.read(&mut req).await.unwrap();
        let err = payload.decode::<Value>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ledger {
        balance: u128,
        debt: i128,
    }

    #[tokio::test]
    async fn test_json_reader_keeps_128_bit_integers() {
        let mut req = MockRequest::new(Method::POST, "/ledger").with_body(Bytes::from_static(
            br#"{"balance":18446744073709551616,"debt":-18446744073709551617}"#,
        ));

        let ledger: Ledger = JsonReader.read(&mut req).await.unwrap().decode().unwrap();
        assert_eq!(
            ledger,
            Ledger {
                balance: u64::MAX as u128 + 1,
                debt: -(u64::MAX as i128) - 2,
            }
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Search {
        q: String,
        tag: Vec<String>,
    }

    #[tokio::test]
    async fn test_form_reader_builds_object() {
        let mut req = MockRequest::new(Method::POST, "/search")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body(Bytes::from_static(b"q=rust&tag=a&tag=b"));

        let search: Search = FormReader.read(&mut req).await.unwrap().decode().unwrap();
        assert_eq!(
            search,
            Search {
                q: "rust".into(),
                tag: vec!["a".into(), "b".into()],
            }
        );
    }
}
