//! CRUD handlers and the hydrate/dehydrate cycle
//!
//! Reads walk store documents through per-field dehydration into api data;
//! writes walk api data through hydration into bundles, validate the whole
//! bundle tree, then persist it children first. Related documents embed as
//! uris unless the field asks for full embedding.

use futures::future::{BoxFuture, FutureExt};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::{Map, Value};

use crate::api::request::ApiRequest;
use crate::api::{response, Api};
use crate::bundle::{Bundle, NestedBundles};
use crate::errors::{ApiError, ValidationErrors};
use crate::fields::ApiField;
use crate::paginator::Paginator;
use crate::serializer::{build_content_type, Format};
use crate::store::{document_id, Document, DocumentId, Query};
use crate::validation::check_required_fields;

use super::DocumentResource;

/// Full embedding stops at this depth and falls back to uris, so documents
/// that reference each other still dehydrate to a finite tree.
const MAX_EMBED_DEPTH: usize = 10;

impl DocumentResource {
    // ---- reads ----

    pub(crate) async fn get_list(
        &self,
        api: &Api,
        request: &ApiRequest,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let filter = self.build_filters(api, request).await?;
        let sort = self.build_ordering(request)?;
        let paginator =
            Paginator::from_query(&request.query, self.options.limit, self.options.max_limit)?;
        let (offset, limit) = paginator.slice();

        let result = self
            .store
            .find(
                self.collection(),
                &Query {
                    filter,
                    sort,
                    offset,
                    limit,
                },
            )
            .await?;

        self.prefetch_related(api, request, &result.documents)
            .await?;
        let mut objects = Vec::with_capacity(result.documents.len());
        for document in &result.documents {
            objects.push(self.dehydrate_document(api, request, document, 0).await?);
        }

        let mut data = Map::new();
        data.insert(
            "meta".to_string(),
            Value::Object(paginator.meta(result.total_count, &self.list_uri(api), &request.query)),
        );
        data.insert("objects".to_string(), Value::Array(objects));
        self.create_response(request, &Value::Object(data), StatusCode::OK, None)
    }

    pub(crate) async fn get_detail(
        &self,
        api: &Api,
        request: &ApiRequest,
        id: &DocumentId,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let document = self
            .store
            .get(self.collection(), id)
            .await?
            .ok_or_else(|| self.not_found(api, id))?;
        let data = self.dehydrate_document(api, request, &document, 0).await?;
        self.create_response(request, &data, StatusCode::OK, None)
    }

    /// `/{resource}/set/{id;id;...}/`: the found documents plus the uris
    /// that matched nothing
    pub(crate) async fn get_multiple(
        &self,
        api: &Api,
        request: &ApiRequest,
        ids: &str,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let mut objects = Vec::new();
        let mut not_found = Vec::new();
        for token in ids.split(';').filter(|token| !token.is_empty()) {
            let Some(id) = DocumentId::from_uri_or_id(token) else {
                not_found.push(Value::String(token.to_string()));
                continue;
            };
            match self.store.get(self.collection(), &id).await? {
                Some(document) => {
                    objects.push(self.dehydrate_document(api, request, &document, 0).await?);
                }
                None => {
                    not_found.push(Value::String(self.detail_uri(api, &id.to_string())));
                }
            }
        }

        let mut data = Map::new();
        data.insert("objects".to_string(), Value::Array(objects));
        if !not_found.is_empty() {
            data.insert("not_found".to_string(), Value::Array(not_found));
        }
        self.create_response(request, &Value::Object(data), StatusCode::OK, None)
    }

    // ---- writes ----

    pub(crate) async fn post_list(
        &self,
        api: &Api,
        request: &ApiRequest,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let data = self.deserialize_body(request)?;
        let mut bundle = self.bundle_from_data(api, request, data).await?;
        self.save(api, &mut bundle).await?;

        let id = bundle
            .id()
            .ok_or_else(|| ApiError::Internal("saved bundle lost its id".to_string()))?;
        let location = self.detail_uri(api, &id.to_string());
        if self.options.return_data_on_post {
            let data = self
                .dehydrate_document(api, request, &bundle.document, 0)
                .await?;
            self.create_response(request, &data, StatusCode::CREATED, Some(&location))
        } else {
            Ok(response::empty_response(
                StatusCode::CREATED,
                Some(&location),
            ))
        }
    }

    pub(crate) async fn put_detail(
        &self,
        api: &Api,
        request: &ApiRequest,
        id: &DocumentId,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let data = self.deserialize_body(request)?;
        let Value::Object(map) = data else {
            return Err(ApiError::BadRequest(
                "expected a single JSON object".to_string(),
            ));
        };
        let document = self
            .store
            .get(self.collection(), id)
            .await?
            .ok_or_else(|| self.not_found(api, id))?;

        let mut bundle = Bundle::new(document, map);
        self.hydrate_bundle(api, request, &mut bundle, true).await?;
        self.save(api, &mut bundle).await?;

        let location = self.detail_uri(api, &id.to_string());
        if self.options.return_data_on_put {
            let data = self
                .dehydrate_document(api, request, &bundle.document, 0)
                .await?;
            self.create_response(request, &data, StatusCode::ACCEPTED, Some(&location))
        } else {
            Ok(response::empty_response(
                StatusCode::NO_CONTENT,
                Some(&location),
            ))
        }
    }

    /// Update or create several documents in one request
    ///
    /// Accepts either a bare JSON list or `{"objects": [...]}`.
    pub(crate) async fn put_list(
        &self,
        api: &Api,
        request: &ApiRequest,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let data = self.deserialize_body(request)?;
        let items = match data {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("objects") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(ApiError::BadRequest(
                        "expected a list or an `objects` list".to_string(),
                    ))
                }
            },
            _ => {
                return Err(ApiError::BadRequest(
                    "expected a list or an `objects` list".to_string(),
                ))
            }
        };

        let mut bundles = Vec::with_capacity(items.len());
        for item in items {
            let mut bundle = self.bundle_from_data(api, request, item).await?;
            self.save(api, &mut bundle).await?;
            bundles.push(bundle);
        }

        if self.options.return_data_on_put {
            let mut objects = Vec::with_capacity(bundles.len());
            for bundle in &bundles {
                objects.push(
                    self.dehydrate_document(api, request, &bundle.document, 0)
                        .await?,
                );
            }
            let mut data = Map::new();
            data.insert("objects".to_string(), Value::Array(objects));
            self.create_response(request, &Value::Object(data), StatusCode::ACCEPTED, None)
        } else {
            Ok(response::empty_response(StatusCode::NO_CONTENT, None))
        }
    }

    pub(crate) async fn delete_detail(
        &self,
        id: &DocumentId,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        if self.store.delete(self.collection(), id).await? {
            Ok(response::empty_response(StatusCode::NO_CONTENT, None))
        } else {
            Err(ApiError::NotFound(format!(
                "no `{}` document with id `{id}`",
                self.name
            )))
        }
    }

    /// Delete every document the request's filters match
    pub(crate) async fn delete_list(
        &self,
        api: &Api,
        request: &ApiRequest,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let filter = self.build_filters(api, request).await?;
        let result = self
            .store
            .find(
                self.collection(),
                &Query {
                    filter,
                    ..Query::default()
                },
            )
            .await?;
        for document in &result.documents {
            if let Some(id) = document_id(document) {
                self.store.delete(self.collection(), &id).await?;
            }
        }
        Ok(response::empty_response(StatusCode::NO_CONTENT, None))
    }

    // ---- hydration ----

    fn deserialize_body(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let content_type = request.content_type.as_deref().unwrap_or("application/json");
        self.serializer.deserialize(&request.body, content_type)
    }

    /// Turn one incoming value into a bundle
    ///
    /// A string is read as a reference to an existing document. An object
    /// carrying `resource_uri` addresses an existing document: alone it is a
    /// plain reference, with other keys it becomes a partial update. Any
    /// other object creates a new document with a fresh id.
    pub(crate) fn bundle_from_data<'a>(
        &'a self,
        api: &'a Api,
        request: &'a ApiRequest,
        data: Value,
    ) -> BoxFuture<'a, Result<Bundle, ApiError>> {
        async move {
            match data {
                Value::String(reference) => {
                    let id = DocumentId::from_uri_or_id(&reference).ok_or_else(|| {
                        ApiError::BadRequest(format!(
                            "`{reference}` is not a resource uri or id"
                        ))
                    })?;
                    Ok(reference_bundle(&id))
                }
                Value::Object(map) => {
                    if let Some(uri) = map.get("resource_uri") {
                        let uri = uri.as_str().ok_or_else(|| {
                            ApiError::BadRequest("resource_uri must be a string".to_string())
                        })?;
                        let id = DocumentId::from_uri_or_id(uri).ok_or_else(|| {
                            ApiError::BadRequest(format!("`{uri}` is not a resource uri or id"))
                        })?;
                        if map.len() <= 1 {
                            return Ok(reference_bundle(&id));
                        }
                        let document =
                            self.store.get(self.collection(), &id).await?.ok_or_else(|| {
                                ApiError::NotFound(format!("no document at `{uri}`"))
                            })?;
                        let mut bundle = Bundle::new(document, map);
                        self.hydrate_bundle(api, request, &mut bundle, true).await?;
                        Ok(bundle)
                    } else {
                        let mut document = Document::new();
                        document.insert(
                            "id".to_string(),
                            Value::String(DocumentId::new().to_string()),
                        );
                        let mut bundle = Bundle::new(document, map);
                        bundle.created = true;
                        self.hydrate_bundle(api, request, &mut bundle, false).await?;
                        Ok(bundle)
                    }
                }
                other => Err(ApiError::BadRequest(format!(
                    "cannot build a `{}` document from `{other}`",
                    self.name
                ))),
            }
        }
        .boxed()
    }

    /// Run every writable field's hydration against the bundle
    ///
    /// With `partial` set, fields absent from the data keep their stored
    /// value instead of resetting.
    async fn hydrate_bundle(
        &self,
        api: &Api,
        request: &ApiRequest,
        bundle: &mut Bundle,
        partial: bool,
    ) -> Result<(), ApiError> {
        for field in &self.fields {
            if field.readonly {
                continue;
            }
            if partial && !bundle.data.contains_key(&field.name) {
                continue;
            }
            if field.is_related() {
                self.hydrate_related(api, request, bundle, field).await?;
            } else if let Some(value) = field.hydrate(bundle)? {
                bundle.set(field.attribute_name(), value);
            }
        }
        Ok(())
    }

    /// Hydrate one related field: bundle up its data through the related
    /// resource and store the id (or id list) on the document
    async fn hydrate_related(
        &self,
        api: &Api,
        request: &ApiRequest,
        bundle: &mut Bundle,
        field: &ApiField,
    ) -> Result<(), ApiError> {
        let related = self.related_resource(api, field)?;
        let raw = bundle.data.get(&field.name).cloned();

        if field.is_to_many() {
            let items = match raw {
                None | Some(Value::Null) => {
                    bundle.set(field.attribute_name(), Value::Array(Vec::new()));
                    return Ok(());
                }
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(ApiError::field(&field.name, "expected a list"));
                }
            };
            let mut ids = Vec::with_capacity(items.len());
            let mut children = Vec::with_capacity(items.len());
            for item in items {
                let child = related.bundle_from_data(api, request, item).await?;
                let id = child
                    .id()
                    .ok_or_else(|| ApiError::Internal("related bundle has no id".to_string()))?;
                ids.push(Value::String(id.to_string()));
                children.push(child);
            }
            bundle.set(field.attribute_name(), Value::Array(ids));
            bundle.nested.push(NestedBundles {
                field_name: field.name.clone(),
                resource: related.name().to_string(),
                bundles: children,
            });
        } else {
            match raw {
                None | Some(Value::Null) => {
                    bundle.set(field.attribute_name(), Value::Null);
                }
                Some(value) => {
                    let child = related.bundle_from_data(api, request, value).await?;
                    let id = child.id().ok_or_else(|| {
                        ApiError::Internal("related bundle has no id".to_string())
                    })?;
                    bundle.set(field.attribute_name(), Value::String(id.to_string()));
                    bundle.nested.push(NestedBundles {
                        field_name: field.name.clone(),
                        resource: related.name().to_string(),
                        bundles: vec![child],
                    });
                }
            }
        }
        Ok(())
    }

    // ---- validation and persistence ----

    /// Validate the whole bundle tree, then persist it children first
    ///
    /// Nothing is written when any bundle in the tree fails validation.
    pub(crate) async fn save(&self, api: &Api, bundle: &mut Bundle) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        self.validate_tree(api, bundle, "", &mut errors)?;
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        self.persist_tree(api, bundle).await
    }

    fn validate_tree(
        &self,
        api: &Api,
        bundle: &Bundle,
        prefix: &str,
        errors: &mut ValidationErrors,
    ) -> Result<(), ApiError> {
        if bundle.uri_only {
            return Ok(());
        }

        let mut local = ValidationErrors::new();
        check_required_fields(&self.fields, bundle, &mut local);
        self.validator.validate(bundle, &mut local);
        for (field, messages) in local {
            errors
                .entry(format!("{prefix}{field}"))
                .or_default()
                .extend(messages);
        }

        for nested in &bundle.nested {
            let related = api.resource(&nested.resource)?;
            let to_many = self
                .field(&nested.field_name)
                .is_some_and(ApiField::is_to_many);
            for (index, child) in nested.bundles.iter().enumerate() {
                let child_prefix = if to_many {
                    format!("{prefix}{}.{index}.", nested.field_name)
                } else {
                    format!("{prefix}{}.", nested.field_name)
                };
                related.validate_tree(api, child, &child_prefix, errors)?;
            }
        }
        Ok(())
    }

    fn persist_tree<'a>(
        &'a self,
        api: &'a Api,
        bundle: &'a Bundle,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        async move {
            for nested in &bundle.nested {
                let related = api.resource(&nested.resource)?;
                for child in &nested.bundles {
                    related.persist_tree(api, child).await?;
                }
            }
            if !bundle.uri_only {
                self.store.save(self.collection(), &bundle.document).await?;
            }
            Ok(())
        }
        .boxed()
    }

    // ---- dehydration ----

    /// Batch-load full-embedded related documents into the request cache
    async fn prefetch_related(
        &self,
        api: &Api,
        request: &ApiRequest,
        documents: &[Document],
    ) -> Result<(), ApiError> {
        for field in &self.fields {
            if !field.is_related() || !field.full {
                continue;
            }
            let related = self.related_resource(api, field)?;

            let mut wanted = Vec::new();
            for document in documents {
                match document.get(field.attribute_name()) {
                    Some(Value::String(id)) => wanted.extend(DocumentId::from_uri_or_id(id)),
                    Some(Value::Array(ids)) => {
                        for id in ids {
                            if let Some(id) = id.as_str() {
                                wanted.extend(DocumentId::from_uri_or_id(id));
                            }
                        }
                    }
                    _ => {}
                }
            }
            wanted.sort_unstable();
            wanted.dedup();
            wanted.retain(|id| request.cached_document(related.collection(), id).is_none());

            for document in related
                .store
                .get_many(related.collection(), &wanted)
                .await?
            {
                request.cache_document(related.collection(), document);
            }
        }
        Ok(())
    }

    /// Turn one stored document into api data
    pub(crate) fn dehydrate_document<'a>(
        &'a self,
        api: &'a Api,
        request: &'a ApiRequest,
        document: &'a Document,
        depth: usize,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        async move {
            let bundle = Bundle::from_document(document.clone());
            let mut data = Map::new();
            for field in &self.fields {
                let value = if field.name == "resource_uri" {
                    document_id(document).map_or(Value::Null, |id| {
                        Value::String(self.detail_uri(api, &id.to_string()))
                    })
                } else if field.is_related() {
                    self.dehydrate_related(api, request, document, field, depth)
                        .await?
                } else {
                    field.dehydrate(&bundle)?
                };
                data.insert(field.name.clone(), value);
            }
            Ok(Value::Object(data))
        }
        .boxed()
    }

    /// Related field on the way out: uri by default, embedded document when
    /// the field asks for `full` (up to `MAX_EMBED_DEPTH`)
    async fn dehydrate_related(
        &self,
        api: &Api,
        request: &ApiRequest,
        document: &Document,
        field: &ApiField,
        depth: usize,
    ) -> Result<Value, ApiError> {
        let related = self.related_resource(api, field)?;
        let full = field.full && depth < MAX_EMBED_DEPTH;

        if field.is_to_many() {
            let ids = match document.get(field.attribute_name()) {
                Some(Value::Array(ids)) => ids.as_slice(),
                _ => return Ok(Value::Array(Vec::new())),
            };
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(id) = id.as_str().and_then(DocumentId::from_uri_or_id) else {
                    continue;
                };
                if full {
                    // Embedded documents that no longer exist are dropped
                    if let Some(embedded) =
                        self.fetch_related(request, related, &id).await?
                    {
                        out.push(
                            related
                                .dehydrate_document(api, request, &embedded, depth + 1)
                                .await?,
                        );
                    }
                } else {
                    out.push(Value::String(related.detail_uri(api, &id.to_string())));
                }
            }
            Ok(Value::Array(out))
        } else {
            let Some(id) = document
                .get(field.attribute_name())
                .and_then(Value::as_str)
                .and_then(DocumentId::from_uri_or_id)
            else {
                return Ok(Value::Null);
            };
            if full {
                match self.fetch_related(request, related, &id).await? {
                    Some(embedded) => {
                        related
                            .dehydrate_document(api, request, &embedded, depth + 1)
                            .await
                    }
                    None => Ok(Value::Null),
                }
            } else {
                Ok(Value::String(related.detail_uri(api, &id.to_string())))
            }
        }
    }

    async fn fetch_related(
        &self,
        request: &ApiRequest,
        related: &DocumentResource,
        id: &DocumentId,
    ) -> Result<Option<Document>, ApiError> {
        if let Some(document) = request.cached_document(related.collection(), id) {
            return Ok(Some(document));
        }
        Ok(related.store.get(related.collection(), id).await?)
    }

    // ---- responses ----

    /// Serialize `data` in the request's negotiated format
    pub(crate) fn create_response(
        &self,
        request: &ApiRequest,
        data: &Value,
        status: StatusCode,
        location: Option<&str>,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let mime = self.serializer.determine_format(
            request.format_param(),
            request.accept.as_deref(),
            &self.options.default_format,
        );
        let format = Format::from_mime(&mime).unwrap_or(Format::Json);
        let body = self.serializer.serialize(data, format)?;
        Ok(response::data_response(
            status,
            &build_content_type(format.mime()),
            body,
            location,
        ))
    }

    fn not_found(&self, api: &Api, id: &DocumentId) -> ApiError {
        ApiError::NotFound(format!(
            "no document at `{}`",
            self.detail_uri(api, &id.to_string())
        ))
    }
}

fn reference_bundle(id: &DocumentId) -> Bundle {
    let mut document = Document::new();
    document.insert("id".to_string(), Value::String(id.to_string()));
    Bundle {
        document,
        uri_only: true,
        ..Bundle::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hyper::header::HeaderMap;
    use hyper::Method;

    use super::*;
    use crate::fields::DocumentSchema;
    use crate::store::MemoryStore;

    fn note_api() -> Api {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

        let person = DocumentSchema::new("person").field(ApiField::string("name").required(true));
        let note = DocumentSchema::new("note")
            .field(ApiField::string("title").required(true))
            .field(ApiField::integer("views").default_value(Value::from(0)))
            .field(ApiField::to_one("author", "person"))
            .field(ApiField::to_many("tags", "tag"));
        let tag = DocumentSchema::new("tag").field(ApiField::string("label").required(true));

        let mut api = Api::new("api", "v1");
        api.register(
            DocumentResource::build("person", person, store.clone())
                .finish()
                .unwrap(),
        );
        api.register(
            DocumentResource::build("note", note, store.clone())
                .field(ApiField::to_one("author", "person").full(true))
                .field(ApiField::to_many("tags", "tag"))
                .finish()
                .unwrap(),
        );
        api.register(DocumentResource::build("tag", tag, store).finish().unwrap());
        api
    }

    fn post(path: &str, body: &str) -> ApiRequest {
        ApiRequest::new(
            Method::POST,
            path,
            &HeaderMap::new(),
            Bytes::from(body.to_string()),
            None,
        )
    }

    fn body_json(response: Response<Full<Bytes>>) -> Value {
        use http_body_util::BodyExt;
        let collected = futures::executor::block_on(response.into_body().collect()).unwrap();
        serde_json::from_slice(&collected.to_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_post_creates_and_embeds_related() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();
        let request = post(
            "/api/v1/note/",
            r#"{"title": "day one", "author": {"name": "ada"}, "tags": [{"label": "work"}]}"#,
        );

        let response = note.post_list(&api, &request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get("Location")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(location.starts_with("/api/v1/note/"));

        let data = body_json(response);
        assert_eq!(data["title"], "day one");
        assert_eq!(data["views"], 0);
        // The author field is full, so it comes back embedded
        assert_eq!(data["author"]["name"], "ada");
        // Tags are uri-only
        assert!(data["tags"][0].as_str().unwrap().starts_with("/api/v1/tag/"));
    }

    #[tokio::test]
    async fn test_validation_failure_persists_nothing() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();
        // The nested author is missing its required name
        let request = post(
            "/api/v1/note/",
            r#"{"title": "draft", "author": {"nickname": "x"}}"#,
        );

        let result = note.post_list(&api, &request).await;
        match result {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.contains_key("author.name"));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
        assert_eq!(note.store.count("note").await.unwrap(), 0);
        let person = api.resource("person").unwrap();
        assert_eq!(person.store.count("person").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_detail_updates_only_sent_fields() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();

        let request = post("/api/v1/note/", r#"{"title": "before", "views": 7}"#);
        let created = body_json(note.post_list(&api, &request).await.unwrap());
        let id = DocumentId::from_uri_or_id(created["resource_uri"].as_str().unwrap()).unwrap();

        let update = ApiRequest::new(
            Method::PUT,
            "/api/v1/note/x/",
            &HeaderMap::new(),
            Bytes::from(r#"{"title": "after"}"#),
            None,
        );
        let response = note.put_detail(&api, &update, &id).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let data = body_json(response);
        assert_eq!(data["title"], "after");
        assert_eq!(data["views"], 7);
    }

    #[tokio::test]
    async fn test_delete_detail_then_missing() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();

        let request = post("/api/v1/note/", r#"{"title": "gone soon"}"#);
        let created = body_json(note.post_list(&api, &request).await.unwrap());
        let id = DocumentId::from_uri_or_id(created["resource_uri"].as_str().unwrap()).unwrap();

        let response = note.delete_detail(&id).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let result = note.delete_detail(&id).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_list_meta_and_objects() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();
        for title in ["a", "b", "c"] {
            let request = post("/api/v1/note/", &format!(r#"{{"title": "{title}"}}"#));
            note.post_list(&api, &request).await.unwrap();
        }

        let request = ApiRequest::bare(Method::GET, "/api/v1/note/");
        let data = body_json(note.get_list(&api, &request).await.unwrap());
        assert_eq!(data["meta"]["total_count"], 3);
        assert_eq!(data["meta"]["limit"], 20);
        assert_eq!(data["objects"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reference_by_uri_is_not_rehydrated() {
        let api = note_api();
        let person = api.resource("person").unwrap().clone();
        let note = api.resource("note").unwrap().clone();

        let request = post("/api/v1/person/", r#"{"name": "grace"}"#);
        let created = body_json(person.post_list(&api, &request).await.unwrap());
        let uri = created["resource_uri"].as_str().unwrap().to_string();

        let request = post(
            "/api/v1/note/",
            &format!(r#"{{"title": "linked", "author": "{uri}"}}"#),
        );
        let data = body_json(note.post_list(&api, &request).await.unwrap());
        assert_eq!(data["author"]["name"], "grace");
        assert_eq!(person.store.count("person").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_multiple_reports_missing_uris() {
        let api = note_api();
        let note = api.resource("note").unwrap().clone();

        let request = post("/api/v1/note/", r#"{"title": "kept"}"#);
        let created = body_json(note.post_list(&api, &request).await.unwrap());
        let id = created["resource_uri"]
            .as_str()
            .and_then(DocumentId::from_uri_or_id)
            .unwrap();
        let missing = DocumentId::new();

        let request = ApiRequest::bare(Method::GET, "/api/v1/note/set/x/");
        let ids = format!("{id};{missing}");
        let data = body_json(note.get_multiple(&api, &request, &ids).await.unwrap());
        assert_eq!(data["objects"].as_array().unwrap().len(), 1);
        assert_eq!(data["not_found"].as_array().unwrap().len(), 1);
    }
}
