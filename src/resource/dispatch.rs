//! Request dispatch
//!
//! Walks a request through the method, authentication, authorization and
//! throttling gates, then hands it to the matching handler.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response};
use serde_json::{Map, Value};

use crate::api::request::ApiRequest;
use crate::api::{response, Api};
use crate::errors::ApiError;
use crate::store::DocumentId;

use super::{DocumentResource, RequestKind, ResourceOptions};

impl DocumentResource {
    /// Entry point for `/{resource}/` and `/{resource}/{id}/`
    pub(crate) async fn dispatch(
        &self,
        api: &Api,
        kind: RequestKind,
        request: &ApiRequest,
        id: Option<DocumentId>,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        // PATCH is a partial PUT
        let method = if request.method == Method::PATCH {
            Method::PUT
        } else {
            request.method.clone()
        };

        let allowed = match kind {
            RequestKind::List => self.options.list_methods(),
            RequestKind::Detail => self.options.detail_methods(),
        };
        if method == Method::OPTIONS {
            return Ok(response::options_response(&ResourceOptions::allow_header(
                allowed,
            )));
        }
        if !allowed.contains(&method) {
            return Err(ApiError::MethodNotAllowed {
                allowed: ResourceOptions::allow_header(allowed),
            });
        }

        let identifier = self.guard(request).await?;
        let result = match kind {
            RequestKind::List => match method {
                Method::GET => self.get_list(api, request).await,
                Method::POST => self.post_list(api, request).await,
                Method::PUT => self.put_list(api, request).await,
                Method::DELETE => self.delete_list(api, request).await,
                _ => Err(ApiError::MethodNotAllowed {
                    allowed: ResourceOptions::allow_header(allowed),
                }),
            },
            RequestKind::Detail => {
                let id =
                    id.ok_or_else(|| ApiError::Internal("detail dispatch without an id".into()))?;
                match method {
                    Method::GET => self.get_detail(api, request, &id).await,
                    // Creating a subordinate of a document is not a thing here
                    Method::POST => Err(ApiError::NotImplemented),
                    Method::PUT => self.put_detail(api, request, &id).await,
                    Method::DELETE => self.delete_detail(&id).await,
                    _ => Err(ApiError::MethodNotAllowed {
                        allowed: ResourceOptions::allow_header(allowed),
                    }),
                }
            }
        };

        if result.is_ok() {
            self.throttle.accessed(&identifier);
        }
        result
    }

    /// Entry point for `/{resource}/schema/`
    pub(crate) async fn dispatch_schema(
        &self,
        request: &ApiRequest,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let allowed = [Method::GET];
        if request.method == Method::OPTIONS {
            return Ok(response::options_response(&ResourceOptions::allow_header(
                &allowed,
            )));
        }
        if request.method != Method::GET {
            return Err(ApiError::MethodNotAllowed {
                allowed: ResourceOptions::allow_header(&allowed),
            });
        }

        let identifier = self.guard(request).await?;
        let schema = Value::Object(self.build_schema());
        let response = self.create_response(request, &schema, hyper::StatusCode::OK, None)?;
        self.throttle.accessed(&identifier);
        Ok(response)
    }

    /// Entry point for `/{resource}/set/{id;id;...}/`
    pub(crate) async fn dispatch_multiple(
        &self,
        api: &Api,
        request: &ApiRequest,
        ids: &str,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let allowed = [Method::GET];
        if request.method == Method::OPTIONS {
            return Ok(response::options_response(&ResourceOptions::allow_header(
                &allowed,
            )));
        }
        if request.method != Method::GET {
            return Err(ApiError::MethodNotAllowed {
                allowed: ResourceOptions::allow_header(&allowed),
            });
        }

        let identifier = self.guard(request).await?;
        let response = self.get_multiple(api, request, ids).await?;
        self.throttle.accessed(&identifier);
        Ok(response)
    }

    /// Authentication, authorization and throttle gates shared by all endpoints
    async fn guard(&self, request: &ApiRequest) -> Result<String, ApiError> {
        if !self.authentication.is_authenticated(request).await {
            return Err(ApiError::Unauthorized);
        }
        if !self.authorization.is_authorized(request, None) {
            return Err(ApiError::Forbidden);
        }
        let identifier = self.authentication.identifier(request);
        if self.throttle.should_be_throttled(&identifier) {
            return Err(ApiError::Throttled);
        }
        Ok(identifier)
    }

    /// The introspection document served at `/{resource}/schema/`
    pub(crate) fn build_schema(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        for field in &self.fields {
            let mut entry = Map::new();
            entry.insert(
                "default".to_string(),
                field.default.clone().unwrap_or(Value::Null),
            );
            entry.insert(
                "type".to_string(),
                Value::String(field.field_type.schema_type().to_string()),
            );
            entry.insert("required".to_string(), Value::Bool(field.required));
            entry.insert("readonly".to_string(), Value::Bool(field.readonly));
            entry.insert("unique".to_string(), Value::Bool(field.unique));
            entry.insert(
                "help_text".to_string(),
                Value::String(field.help_text().to_string()),
            );
            fields.insert(field.name.clone(), Value::Object(entry));
        }

        let method_names = |methods: &[Method]| {
            Value::Array(
                methods
                    .iter()
                    .map(|method| Value::String(method.as_str().to_lowercase()))
                    .collect(),
            )
        };

        let mut schema = Map::new();
        schema.insert("fields".to_string(), Value::Object(fields));
        schema.insert(
            "default_format".to_string(),
            Value::String(self.options.default_format.clone()),
        );
        schema.insert(
            "default_limit".to_string(),
            Value::Number(self.options.limit.into()),
        );
        schema.insert(
            "allowed_list_http_methods".to_string(),
            method_names(self.options.list_methods()),
        );
        schema.insert(
            "allowed_detail_http_methods".to_string(),
            method_names(self.options.detail_methods()),
        );
        if !self.options.ordering.is_empty() {
            schema.insert(
                "ordering".to_string(),
                Value::Array(
                    self.options
                        .ordering
                        .iter()
                        .map(|name| Value::String(name.clone()))
                        .collect(),
                ),
            );
        }
        if !self.options.filtering.is_empty() {
            let mut filtering = Map::new();
            for (name, spec) in &self.options.filtering {
                filtering.insert(name.clone(), spec.schema_value());
            }
            schema.insert("filtering".to_string(), Value::Object(filtering));
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fields::{ApiField, DocumentSchema};
    use crate::store::MemoryStore;

    fn api_with_note() -> Api {
        let schema = DocumentSchema::new("note").field(ApiField::string("title"));
        let resource = DocumentResource::build("note", schema, Arc::new(MemoryStore::new()))
            .finish()
            .unwrap();
        let mut api = Api::new("api", "v1");
        api.register(resource);
        api
    }

    #[tokio::test]
    async fn test_options_reports_allowed_methods() {
        let api = api_with_note();
        let resource = api.resource("note").unwrap().clone();
        let request = ApiRequest::bare(Method::OPTIONS, "/api/v1/note/");

        let response = resource
            .dispatch(&api, RequestKind::List, &request, None)
            .await
            .unwrap();
        assert_eq!(response.status(), hyper::StatusCode::OK);
        let allow = response.headers().get("Allow").unwrap().to_str().unwrap();
        assert!(allow.contains("GET"));
        assert!(allow.contains("OPTIONS"));
    }

    #[tokio::test]
    async fn test_unlisted_method_is_rejected() {
        let api = api_with_note();
        let request = ApiRequest::bare(Method::DELETE, "/api/v1/note/");

        let options = ResourceOptions {
            list_allowed_methods: Some(vec![Method::GET]),
            ..ResourceOptions::default()
        };
        let schema = DocumentSchema::new("note").field(ApiField::string("title"));
        let readonly = DocumentResource::build("note", schema, Arc::new(MemoryStore::new()))
            .options(options)
            .finish()
            .unwrap();

        let result = readonly
            .dispatch(&api, RequestKind::List, &request, None)
            .await;
        match result {
            Err(ApiError::MethodNotAllowed { allowed }) => {
                assert_eq!(allowed, "GET,OPTIONS");
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unauthorized() {
        use crate::auth::ApiKeyAuthentication;

        let api = api_with_note();
        let schema = DocumentSchema::new("note").field(ApiField::string("title"));
        let resource = DocumentResource::build("note", schema, Arc::new(MemoryStore::new()))
            .authentication(ApiKeyAuthentication::new(vec!["secret".to_string()]))
            .finish()
            .unwrap();

        let request = ApiRequest::bare(Method::GET, "/api/v1/note/");
        let result = resource
            .dispatch(&api, RequestKind::List, &request, None)
            .await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_second_request_hits_the_throttle() {
        use crate::throttle::MemoryThrottle;

        let api = api_with_note();
        let schema = DocumentSchema::new("note").field(ApiField::string("title"));
        let resource = DocumentResource::build("note", schema, Arc::new(MemoryStore::new()))
            .throttle(MemoryThrottle::new(1, 3600, 604_800))
            .finish()
            .unwrap();

        let request = ApiRequest::bare(Method::GET, "/api/v1/note/");
        let first = resource
            .dispatch(&api, RequestKind::List, &request, None)
            .await;
        assert!(first.is_ok());

        let second = resource
            .dispatch(&api, RequestKind::List, &request, None)
            .await;
        assert!(matches!(second, Err(ApiError::Throttled)));
    }

    #[tokio::test]
    async fn test_post_to_detail_is_not_implemented() {
        let api = api_with_note();
        let resource = api.resource("note").unwrap().clone();
        let request = ApiRequest::bare(Method::POST, "/api/v1/note/x/");

        let result = resource
            .dispatch(
                &api,
                RequestKind::Detail,
                &request,
                Some(crate::store::DocumentId::new()),
            )
            .await;
        assert!(matches!(result, Err(ApiError::NotImplemented)));
    }

    #[test]
    fn test_schema_document_shape() {
        let api = api_with_note();
        let resource = api.resource("note").unwrap();
        let schema = resource.build_schema();

        assert_eq!(schema["default_limit"], 20);
        assert!(schema["fields"]["title"]["help_text"].is_string());
        assert_eq!(schema["fields"]["resource_uri"]["readonly"], true);
        let methods = schema["allowed_list_http_methods"].as_array().unwrap();
        assert!(methods.contains(&Value::String("get".to_string())));
    }
}
