//! Query building
//!
//! Turns `field[__relation...][__operator]=value` parameters into store
//! filters and `order_by` into sort keys. A field admits a lookup only when
//! both the resource's `filtering` allow-list and the field type's operator
//! table agree. Relational lookups resolve against the related resource and
//! collapse into an id membership test on the local field.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::errors::ApiError;
use crate::filters::{
    operator_allowed, parse_filter_key, parse_filter_value, Condition, Filter, Operator,
};
use crate::store::{document_id, Query, SortKey};

use super::DocumentResource;

/// Query keys that are paging/formatting machinery, never filters
const RESERVED_KEYS: &[&str] = &["format", "limit", "offset", "order_by"];

impl DocumentResource {
    /// Build the store filter for a list request
    ///
    /// Keys naming nothing we know are ignored; known fields with lookups
    /// the configuration or the field type rejects are errors.
    pub(crate) async fn build_filters(
        &self,
        api: &Api,
        request: &ApiRequest,
    ) -> Result<Filter, ApiError> {
        let mut and_group = Vec::new();
        let mut or_group = Vec::new();

        for (key, raw) in &request.query {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let parsed = parse_filter_key(key);
            let head = &parsed.parts[0];
            if self.field_or_schema(head).is_none() {
                continue;
            }

            let condition = self
                .build_condition(api, &parsed.parts, parsed.operator, raw)
                .await?;
            if parsed.or_group {
                or_group.push(Filter::Condition(condition));
            } else {
                and_group.push(Filter::Condition(condition));
            }
        }

        if !or_group.is_empty() {
            and_group.push(Filter::Or(or_group));
        }
        Ok(Filter::And(and_group))
    }

    /// One condition on this resource, recursing through related resources
    /// for multi-part field paths
    fn build_condition<'a>(
        &'a self,
        api: &'a Api,
        parts: &'a [String],
        operator: Operator,
        raw: &'a str,
    ) -> BoxFuture<'a, Result<Condition, ApiError>> {
        async move {
            let head = &parts[0];
            let field = self.field_or_schema(head).ok_or_else(|| {
                ApiError::InvalidFilter(format!(
                    "`{}` has no field `{head}` to filter on",
                    self.name()
                ))
            })?;
            let spec = self.options.filtering.get(head).ok_or_else(|| {
                ApiError::InvalidFilter(format!("filtering on `{head}` is not allowed"))
            })?;

            if parts.len() > 1 {
                if !field.is_related() {
                    return Err(ApiError::InvalidFilter(format!(
                        "`{head}` is not a related field, cannot look up `{}`",
                        parts[1..].join("__")
                    )));
                }
                if !spec.allows_relations() {
                    return Err(ApiError::InvalidFilter(format!(
                        "lookups through `{head}` are not allowed"
                    )));
                }
                let related = self.related_resource(api, field)?;
                let ids = related
                    .matching_ids(api, &parts[1..], operator, raw)
                    .await?;
                Ok(Condition {
                    attribute: field.attribute_name().to_string(),
                    operator: Operator::In,
                    value: ids,
                })
            } else {
                if !spec.allows(operator) {
                    return Err(ApiError::InvalidFilter(format!(
                        "`{}` is not allowed on `{head}`",
                        operator.as_str()
                    )));
                }
                if !operator_allowed(&field.field_type, operator) {
                    return Err(ApiError::InvalidFilter(format!(
                        "`{head}` does not support `{}`",
                        operator.as_str()
                    )));
                }
                let value = parse_filter_value(&field.name, &field.field_type, operator, raw)?;
                Ok(Condition {
                    attribute: field.attribute_name().to_string(),
                    operator,
                    value,
                })
            }
        }
        .boxed()
    }

    /// Resolve the tail of a relational lookup to the ids it matches here
    async fn matching_ids(
        &self,
        api: &Api,
        parts: &[String],
        operator: Operator,
        raw: &str,
    ) -> Result<Value, ApiError> {
        let condition = self.build_condition(api, parts, operator, raw).await?;
        let result = self
            .store
            .find(
                self.collection(),
                &Query {
                    filter: Filter::Condition(condition),
                    ..Query::default()
                },
            )
            .await?;
        let ids = result
            .documents
            .iter()
            .filter_map(document_id)
            .map(|id| Value::String(id.to_string()))
            .collect();
        Ok(Value::Array(ids))
    }

    /// Build the sort keys for a list request from `order_by`
    pub(crate) fn build_ordering(&self, request: &ApiRequest) -> Result<Vec<SortKey>, ApiError> {
        let mut keys = Vec::new();
        for (key, raw) in &request.query {
            if key != "order_by" {
                continue;
            }
            for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
                let (name, descending) = token
                    .strip_prefix('-')
                    .map_or((token, false), |rest| (rest, true));
                if !self.options.ordering.iter().any(|allowed| allowed == name) {
                    return Err(ApiError::InvalidSort(format!(
                        "ordering on `{name}` is not allowed"
                    )));
                }
                let field = self.field(name).ok_or_else(|| {
                    ApiError::InvalidSort(format!(
                        "`{}` has no field `{name}` to order by",
                        self.name()
                    ))
                })?;
                if field.is_related() {
                    return Err(ApiError::InvalidSort(format!(
                        "cannot order by the related field `{name}`"
                    )));
                }
                keys.push(SortKey {
                    attribute: field.attribute_name().to_string(),
                    descending,
                });
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hyper::Method;
    use serde_json::json;

    use super::*;
    use crate::fields::{ApiField, DocumentSchema};
    use crate::resource::FilterSpec;
    use crate::store::{DocumentStore, MemoryStore};

    async fn seeded_api() -> Api {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

        let person = DocumentSchema::new("person").field(ApiField::string("name"));
        let note = DocumentSchema::new("note")
            .field(ApiField::string("title"))
            .field(ApiField::integer("views"))
            .field(ApiField::to_one("author", "person"));

        let mut api = Api::new("api", "v1");
        api.register(
            DocumentResource::build("person", person, store.clone())
                .filtering("name", FilterSpec::All)
                .finish()
                .unwrap(),
        );
        api.register(
            DocumentResource::build("note", note, store.clone())
                .field(ApiField::to_one("author", "person"))
                .filtering("title", FilterSpec::All)
                .filtering("views", FilterSpec::Operators(vec![Operator::Exact, Operator::Gte]))
                .filtering("author", FilterSpec::AllWithRelations)
                .ordering(&["title", "views"])
                .finish()
                .unwrap(),
        );

        let ada = uuid::Uuid::new_v4().to_string();
        let doc = json!({"id": ada, "name": "ada"});
        store.save("person", doc.as_object().unwrap()).await.unwrap();
        for (title, views, author) in [("alpha", 3, Some(&ada)), ("beta", 9, None)] {
            let doc = json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "title": title,
                "views": views,
                "author": author,
            });
            store.save("note", doc.as_object().unwrap()).await.unwrap();
        }
        api
    }

    fn get(path_and_query: &str) -> ApiRequest {
        ApiRequest::bare(Method::GET, path_and_query)
    }

    #[tokio::test]
    async fn test_simple_filter_matches() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        let request = get("/api/v1/note/?title=alpha");
        let filter = note.build_filters(&api, &request).await.unwrap();
        let result = note
            .store
            .find("note", &Query { filter, ..Query::default() })
            .await
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.documents[0]["title"], "alpha");
    }

    #[tokio::test]
    async fn test_unknown_keys_are_ignored() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        let request = get("/api/v1/note/?callback=jsonp123&title=alpha");
        let filter = note.build_filters(&api, &request).await.unwrap();
        let result = note
            .store
            .find("note", &Query { filter, ..Query::default() })
            .await
            .unwrap();
        assert_eq!(result.total_count, 1);
    }

    #[tokio::test]
    async fn test_disallowed_operator_is_rejected() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        // Gt is not in the allow-list for views
        let request = get("/api/v1/note/?views__gt=1");
        let result = note.build_filters(&api, &request).await;
        assert!(matches!(result, Err(ApiError::InvalidFilter(_))));

        // `All` admits size on title, but the string type table does not
        let request = get("/api/v1/note/?views__gte=1&title__size=2");
        let result = note.build_filters(&api, &request).await;
        assert!(matches!(result, Err(ApiError::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn test_relational_lookup_collapses_to_ids() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        let request = get("/api/v1/note/?author__name__istartswith=AD");
        let filter = note.build_filters(&api, &request).await.unwrap();
        let result = note
            .store
            .find("note", &Query { filter, ..Query::default() })
            .await
            .unwrap();
        assert_eq!(result.total_count, 1);
        assert_eq!(result.documents[0]["title"], "alpha");
    }

    #[tokio::test]
    async fn test_relational_lookup_requires_opt_in() {
        let api = seeded_api().await;
        let person = api.resource("person").unwrap().clone();

        // person's name is filterable but carries no relations, and the
        // field is not related anyway
        let request = get("/api/v1/person/?name__other__exact=x");
        let result = person.build_filters(&api, &request).await;
        assert!(matches!(result, Err(ApiError::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn test_or_prefixed_filters_group_together() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        let request = get("/api/v1/note/?OR__title=alpha&OR__title=beta");
        let filter = note.build_filters(&api, &request).await.unwrap();
        let result = note
            .store
            .find("note", &Query { filter, ..Query::default() })
            .await
            .unwrap();
        assert_eq!(result.total_count, 2);
    }

    #[tokio::test]
    async fn test_ordering_tokens() {
        let api = seeded_api().await;
        let note = api.resource("note").unwrap().clone();

        let request = get("/api/v1/note/?order_by=-views,title");
        let keys = note.build_ordering(&request).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].descending);
        assert_eq!(keys[0].attribute, "views");
        assert!(!keys[1].descending);

        let request = get("/api/v1/note/?order_by=id");
        assert!(matches!(
            note.build_ordering(&request),
            Err(ApiError::InvalidSort(_))
        ));
    }
}
