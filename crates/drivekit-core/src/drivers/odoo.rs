//! Odoo ERP driver.
//!
//! All operations go through the JSON-RPC `execute_kw` entry point.
//! Object discovery is live: models come from `ir.model` and field
//! schemas from `fields_get`.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::required_env;
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpBody, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::schema::{suggest_similar, FieldSpec, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const MAX_PAGE_SIZE: usize = 1000;
const DEFAULT_LIMIT: usize = 80;
const DEFAULT_MODEL: &str = "res.partner";

pub struct OdooDriver {
    transport: RestTransport,
    database: String,
    api_key: String,
}

impl OdooDriver {
    /// Reads `ODOO_BASE_URL`, `ODOO_DATABASE`, and `ODOO_API_KEY` from the
    /// environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let base_url = required_env("ODOO_BASE_URL")?;
        let database = required_env("ODOO_DATABASE")?;
        let api_key = required_env("ODOO_API_KEY")?;
        Ok(Self::new(
            base_url,
            database,
            api_key,
            Arc::new(ReqwestHttpClient::new()),
        ))
    }

    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        api_key: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let transport = RestTransport::new(VendorId::Odoo, base_url, HttpAuth::None, http);
        Self {
            transport,
            database: database.into(),
            api_key: api_key.into(),
        }
    }

    /// Issues one `execute_kw` call and unwraps the JSON-RPC result.
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, DriverError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [self.database, self.api_key, model, method, args, kwargs],
            },
            "id": 1,
        });

        let request = HttpRequest::post(self.transport.join("/api/v1/call"))
            .with_body(HttpBody::Json(body));
        let value = self.transport.send_json(request).await?;

        if let Some(error) = value.get("error") {
            return Err(self.map_rpc_error(model, error));
        }

        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    }

    fn map_rpc_error(&self, model: &str, error: &Value) -> DriverError {
        let data_message = error
            .pointer("/data/message")
            .and_then(Value::as_str)
            .unwrap_or("");
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("JSON-RPC call failed");
        let data_name = error
            .pointer("/data/name")
            .and_then(Value::as_str)
            .unwrap_or("");

        let detail = if data_message.is_empty() {
            message.to_owned()
        } else {
            format!("{message}: {data_message}")
        };

        let combined = format!("{data_name} {data_message}").to_ascii_lowercase();
        let mapped = if combined.contains("accessdenied") || combined.contains("access denied") {
            DriverError::authentication(format!("odoo rejected the credentials: {detail}"))
        } else if combined.contains("object") && combined.contains("doesn't exist")
            || combined.contains("keyerror")
        {
            DriverError::object_not_found(format!("model '{model}' does not exist"))
        } else if combined.contains("validationerror") {
            DriverError::validation(detail)
        } else {
            DriverError::query_syntax(detail)
        };

        mapped.with_detail("model", model)
    }

    /// Splits a query of the form `model:sale.order [domain]` into the
    /// target model and the remaining domain text.
    fn parse_query(query: &str) -> (String, &str) {
        let query = query.trim();
        if let Some(rest) = query.strip_prefix("model:") {
            match rest.split_once(char::is_whitespace) {
                Some((model, domain)) => (model.to_owned(), domain.trim_start()),
                None => (rest.to_owned(), ""),
            }
        } else {
            (String::from(DEFAULT_MODEL), query)
        }
    }

    /// Parses a search domain, which must be a JSON array of triplets
    /// (or the empty string for no filter).
    fn parse_domain(domain: &str) -> Result<Value, DriverError> {
        if domain.is_empty() {
            return Ok(json!([]));
        }

        let value: Value = serde_json::from_str(domain).map_err(|error| {
            DriverError::query_syntax(format!("search domain is not valid JSON: {error}"))
                .with_detail("query", domain)
                .with_detail("query_language", "Odoo Domain Language")
        })?;

        if !value.is_array() {
            return Err(DriverError::query_syntax(
                "search domain must be a JSON array of [field, operator, value] triplets",
            )
            .with_detail("query", domain)
            .with_detail("query_language", "Odoo Domain Language"));
        }

        Ok(value)
    }

    fn field_type_for(odoo_type: &str) -> FieldType {
        match odoo_type {
            "integer" | "many2one_reference" => FieldType::Integer,
            "float" | "monetary" => FieldType::Float,
            "boolean" => FieldType::Boolean,
            "date" | "datetime" => FieldType::DateTime,
            "many2one" => FieldType::Object,
            "one2many" | "many2many" => FieldType::List,
            _ => FieldType::String,
        }
    }

    async fn model_names(&self) -> Result<Vec<String>, DriverError> {
        let result = self
            .execute_kw(
                "ir.model",
                "search_read",
                json!([[]]),
                json!({"fields": ["model"]}),
            )
            .await?;

        let mut names: Vec<String> = envelope::extract_records(&result)
            .into_iter()
            .filter_map(|record| {
                record
                    .get("model")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

impl Driver for OdooDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Odoo
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Offset, Some(MAX_PAGE_SIZE))
            .with_write()
            .with_update()
            .with_delete()
            .with_batch_operations()
            .with_query_language("Odoo Domain Language")
            .with_relationships()
    }

    fn list_objects(&self) -> DriverFuture<'_, Vec<String>> {
        Box::pin(async move { self.model_names().await })
    }

    fn get_fields<'a>(&'a self, object: &'a str) -> DriverFuture<'a, ObjectSchema> {
        Box::pin(async move {
            let result = self
                .execute_kw(
                    object,
                    "fields_get",
                    json!([]),
                    json!({"attributes": ["string", "type", "required", "help"]}),
                )
                .await;

            let result = match result {
                Ok(result) => result,
                Err(error) if error.kind() == crate::ErrorKind::ObjectNotFound => {
                    // Rebuild the error with near-miss suggestions from the
                    // live model list.
                    let models = self.model_names().await?;
                    let suggestions = suggest_similar(
                        object,
                        &models.iter().map(String::as_str).collect::<Vec<_>>(),
                        3,
                    );
                    let mut rebuilt = DriverError::object_not_found(format!(
                        "model '{object}' does not exist"
                    ))
                    .with_detail("requested", object);
                    if !suggestions.is_empty() {
                        rebuilt = rebuilt.with_detail(
                            "did_you_mean",
                            Value::from(
                                suggestions.into_iter().map(Value::from).collect::<Vec<_>>(),
                            ),
                        );
                    }
                    return Err(rebuilt);
                }
                Err(error) => return Err(error),
            };

            let Value::Object(fields) = result else {
                return Err(DriverError::connection(
                    "unexpected fields_get payload shape",
                ));
            };

            let mut schema = ObjectSchema::new();
            for (name, spec) in fields {
                let odoo_type = spec.get("type").and_then(Value::as_str).unwrap_or("char");
                let required = spec
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let description = spec
                    .get("string")
                    .and_then(Value::as_str)
                    .or_else(|| spec.get("help").and_then(Value::as_str))
                    .unwrap_or("")
                    .to_owned();

                schema.insert(
                    name,
                    FieldSpec {
                        field_type: Self::field_type_for(odoo_type),
                        required,
                        description,
                    },
                );
            }
            Ok(schema)
        })
    }

    fn read<'a>(&'a self, request: &'a ReadRequest) -> DriverFuture<'a, Vec<Record>> {
        Box::pin(async move {
            let (model, domain_text) = Self::parse_query(&request.query);
            let domain = Self::parse_domain(domain_text)?;

            let limit = request.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_PAGE_SIZE);
            let mut kwargs = Map::new();
            kwargs.insert(String::from("fields"), json!([]));
            kwargs.insert(String::from("limit"), Value::from(limit));
            if let Some(offset) = request.offset {
                kwargs.insert(String::from("offset"), Value::from(offset));
            }

            let result = self
                .execute_kw(&model, "search_read", json!([domain]), Value::Object(kwargs))
                .await?;

            Ok(envelope::extract_records(&result))
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let result = self
                .execute_kw(
                    object,
                    "create",
                    json!([Value::Object(data.clone())]),
                    json!({}),
                )
                .await?;

            let id = result
                .as_i64()
                .or_else(|| result.get(0).and_then(Value::as_i64))
                .ok_or_else(|| {
                    DriverError::connection("create did not return a record id")
                        .with_detail("model", object)
                })?;

            // Read the record back so callers see server-side defaults.
            let created = self
                .execute_kw(object, "read", json!([[id], []]), json!({}))
                .await?;

            if let Some(record) = envelope::extract_records(&created).into_iter().next() {
                return Ok(record);
            }

            let mut record = data.clone();
            record.insert(String::from("id"), Value::from(id));
            Ok(record)
        })
    }

    fn update<'a>(
        &'a self,
        object: &'a str,
        id: &'a str,
        data: &'a Record,
    ) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let id: i64 = id.parse().map_err(|_| {
                DriverError::validation(format!("odoo record ids are integers, got: '{id}'"))
            })?;

            self.execute_kw(
                object,
                "write",
                json!([[id], Value::Object(data.clone())]),
                json!({}),
            )
            .await?;

            let mut record = data.clone();
            record.insert(String::from("id"), Value::from(id));
            Ok(record)
        })
    }

    fn delete<'a>(&'a self, object: &'a str, id: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            let id: i64 = id.parse().map_err(|_| {
                DriverError::validation(format!("odoo record ids are integers, got: '{id}'"))
            })?;

            let result = self
                .execute_kw(object, "unlink", json!([[id]]), json!({}))
                .await?;
            Ok(result.as_bool().unwrap_or(true))
        })
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.transport.rate_limit_status()
    }
}
