//! OpenAPI 3.1 rendering of a [`Document`].

use super::{Document, SecurityScheme};
use crate::path;
use crate::route::{Fragment, ParamLocation};
use crate::schema::Schema;
use http::StatusCode;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

/// OpenAPI document root object.
#[derive(Debug, Clone, Serialize)]
pub struct OpenApi {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: IndexMap<String, IndexMap<&'static str, Operation>>,
    #[serde(skip_serializing_if = "Components::is_empty")]
    pub components: Components,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, ResponseObject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: &'static str,
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<&'static str, MediaType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaType {
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseObject {
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<&'static str, MediaType>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, Value>,
}

impl Components {
    fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

const JSON: &str = "application/json";

pub(super) fn render(document: &Document) -> OpenApi {
    let mut components = Components::default();
    let mut paths: IndexMap<String, IndexMap<&'static str, Operation>> = IndexMap::new();

    for fragment in document.operations() {
        let operation = render_operation(fragment, &mut components.schemas);
        paths.entry(path::to_openapi_syntax(fragment.path())).or_default().insert(fragment.method().as_lower_str(), operation);

        for object in fragment.definitions().values() {
            schema_json(&Schema::Object(object.clone()), &mut components.schemas);
        }
    }

    for (name, scheme) in document.security_schemes() {
        components.security_schemes.insert(name.clone(), render_security_scheme(scheme));
    }

    let security = document.security_schemes().keys().map(|name| IndexMap::from([(name.clone(), Vec::new())])).collect();

    OpenApi {
        openapi: document.openapi_version().to_string(),
        info: Info {
            title: document.title().to_string(),
            version: document.version().to_string(),
            description: document.description().map(str::to_string),
        },
        servers: document.servers().iter().map(|url| Server { url: url.clone() }).collect(),
        paths,
        components,
        security,
    }
}

fn render_operation(fragment: &Fragment, schemas: &mut IndexMap<String, Value>) -> Operation {
    let parameters = fragment
        .parameters()
        .map(|p| Parameter {
            name: p.name().to_string(),
            location: match p.location() {
                ParamLocation::Query => "query",
                ParamLocation::Header => "header",
                ParamLocation::Path => "path",
            },
            required: p.required(),
            schema: json!({ "type": "string" }),
        })
        .collect();

    let request_body = fragment.request_body().map(|schema| RequestBody {
        required: !matches!(schema, Schema::Optional(_)),
        content: IndexMap::from([(JSON, MediaType { schema: schema_json(schema, schemas) })]),
    });

    let responses = fragment
        .responses()
        .iter()
        .map(|(status, schema)| {
            let description = StatusCode::from_u16(*status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Response")
                .to_string();
            let content = if schema.is_empty() {
                IndexMap::new()
            } else {
                IndexMap::from([(JSON, MediaType { schema: schema_json(schema, schemas) })])
            };
            (status.to_string(), ResponseObject { description, content })
        })
        .collect();

    Operation {
        operation_id: fragment.operation_id(),
        summary: fragment.summary().map(str::to_string),
        description: fragment.description().map(str::to_string),
        tags: fragment.tags().to_vec(),
        parameters,
        request_body,
        responses,
    }
}

/// Converts a schema into JSON Schema, moving named objects into `schemas` and referencing them.
fn schema_json(schema: &Schema, schemas: &mut IndexMap<String, Value>) -> Value {
    match schema {
        Schema::Empty => json!({}),
        Schema::Any => json!({}),
        Schema::String => json!({ "type": "string" }),
        Schema::Integer => json!({ "type": "integer" }),
        Schema::Number => json!({ "type": "number" }),
        Schema::Boolean => json!({ "type": "boolean" }),
        Schema::Array(items) => json!({ "type": "array", "items": schema_json(items, schemas) }),
        Schema::Map(values) => json!({ "type": "object", "additionalProperties": schema_json(values, schemas) }),
        Schema::Optional(inner) => schema_json(inner, schemas),
        Schema::Ref(name) => schema_ref(name),
        Schema::Object(object) => {
            if let Some(name) = object.name()
                && schemas.contains_key(name)
            {
                return schema_ref(name);
            }

            let mut properties = serde_json::Map::new();
            let mut required = Vec::new();
            for field in object.fields() {
                properties.insert(field.name().to_string(), schema_json(field.schema(), schemas));
                if field.is_required() {
                    required.push(Value::from(field.name()));
                }
            }

            let mut rendered = json!({ "type": "object", "properties": properties });
            if !required.is_empty() {
                rendered["required"] = Value::Array(required);
            }

            match object.name() {
                Some(name) => {
                    schemas.insert(name.to_string(), rendered);
                    schema_ref(name)
                }
                None => rendered,
            }
        }
    }
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn render_security_scheme(scheme: &SecurityScheme) -> Value {
    match scheme {
        SecurityScheme::Bearer { format } => {
            let mut value = json!({ "type": "http", "scheme": "bearer" });
            if let Some(format) = format {
                value["bearerFormat"] = Value::from(format.as_str());
            }
            value
        }
        SecurityScheme::OAuth2Implicit { authorization_url, scopes } => json!({
            "type": "oauth2",
            "flows": {
                "implicit": {
                    "authorizationUrl": authorization_url,
                    "scopes": scopes,
                }
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{Context, Response};
    use crate::describe;
    use crate::handler::handler_fn;
    use crate::route::Route;
    use crate::spec::{ApiInfo, SecurityScheme, SpecBuilder};
    use http::StatusCode;
    use indoc::indoc;
    use std::sync::Arc;

    describe! {
        #[allow(dead_code, reason = "only the schema is inspected")]
        struct Item {
            id: String,
            note: Option<String>,
        }
    }

    async fn noop(ctx: Arc<Context>) -> Response {
        ctx.json(&())
    }

    #[test]
    fn renders_openapi_document() {
        let mut builder = SpecBuilder::new(ApiInfo::new("Items API", "1.2.0").description("Manages items"));
        builder.with_prefix("/api").with_group_tag("Items");
        builder.with_security_scheme("bearer", SecurityScheme::bearer());
        for route in [
            Route::get::<Item>("/items/:id", handler_fn(noop)).summary("Fetch").query("fields"),
            Route::post::<Item, Item>("/items", handler_fn(noop)),
            Route::delete::<()>("/items/:id", handler_fn(noop)).response::<String>(StatusCode::NOT_FOUND),
        ] {
            builder.register_fragment(route.into_parts().1);
        }

        let document = builder.build(&["127.0.0.1".to_string()], 9000).unwrap();
        let json = document.to_json().unwrap();

        assert_eq!(json["openapi"], "3.1.0");
        assert_eq!(json["info"]["title"], "Items API");
        assert_eq!(json["servers"][0]["url"], "http://127.0.0.1:9000");

        let get = &json["paths"]["/api/items/{id}"]["get"];
        assert_eq!(get["operationId"], "getItemsById");
        assert_eq!(get["tags"][0], "Items");
        assert_eq!(get["parameters"][0]["name"], "id");
        assert_eq!(get["parameters"][0]["in"], "path");
        assert_eq!(get["parameters"][1]["name"], "fields");
        assert_eq!(get["parameters"][1]["required"], false);
        assert_eq!(get["responses"]["200"]["content"]["application/json"]["schema"]["$ref"], "#/components/schemas/Item");
        assert!(get.get("requestBody").is_none());

        let post = &json["paths"]["/api/items"]["post"];
        assert_eq!(post["requestBody"]["required"], true);

        let delete = &json["paths"]["/api/items/{id}"]["delete"];
        assert!(delete["responses"]["200"].get("content").is_none());
        assert_eq!(delete["responses"]["404"]["content"]["application/json"]["schema"]["type"], "string");

        let item = &json["components"]["schemas"]["Item"];
        assert_eq!(item["properties"]["id"]["type"], "string");
        assert_eq!(item["required"], serde_json::json!(["id"]));

        assert_eq!(json["components"]["securitySchemes"]["bearer"]["scheme"], "bearer");
        assert_eq!(json["security"][0]["bearer"], serde_json::json!([]));
    }

    describe! {
        #[allow(dead_code, reason = "only the schema is inspected")]
        struct Category {
            name: String,
            parent: Option<Box<Category>>,
            children: Vec<Category>,
            items: Vec<Item>,
        }
    }

    #[test]
    fn recursive_and_nested_definitions_land_in_components() {
        let mut builder = SpecBuilder::new(ApiInfo::new("t", "1"));
        builder.register_fragment(Route::get::<Vec<Category>>("/categories", handler_fn(noop)).into_parts().1);
        let json = builder.build(&[], 80).unwrap().to_json().unwrap();

        let get = &json["paths"]["/categories"]["get"];
        assert_eq!(get["responses"]["200"]["content"]["application/json"]["schema"]["items"]["$ref"], "#/components/schemas/Category");

        let category = &json["components"]["schemas"]["Category"];
        assert_eq!(category["properties"]["parent"]["$ref"], "#/components/schemas/Category");
        assert_eq!(category["properties"]["children"]["items"]["$ref"], "#/components/schemas/Category");
        assert_eq!(category["required"], serde_json::json!(["name", "children", "items"]));
        assert_eq!(json["components"]["schemas"]["Item"]["properties"]["id"]["type"], "string");
    }

    #[test]
    fn oauth2_scheme_json() {
        let mut builder = SpecBuilder::new(ApiInfo::new("t", "1"));
        builder.with_oidc("https://id.example/authorize");
        let json = builder.build(&[], 80).unwrap().to_json().unwrap();

        let expected: serde_json::Value = serde_json::from_str(indoc! {r#"
            {
                "type": "oauth2",
                "flows": {
                    "implicit": {
                        "authorizationUrl": "https://id.example/authorize",
                        "scopes": {}
                    }
                }
            }
        "#})
        .unwrap();
        assert_eq!(json["components"]["securitySchemes"]["bearer"], expected);
    }
}
