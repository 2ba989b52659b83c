//! CRUD routes for one resource collection
//!
//! For a schema named `tarefa` with an auto id this registers, in order:
//!
//! | method | pattern | operation |
//! |---|---|---|
//! | GET | `/tarefa` | list, or single read when `?id=` is present |
//! | GET | `/tarefa/{id:int}` | single read |
//! | POST | `/tarefa` | create (201) |
//! | PUT | `/tarefa/{id:int}` | update |
//! | PUT | `/tarefa` | update, identity from `?id=` |
//! | DELETE | `/tarefa/{id:int}` | delete |
//! | DELETE | `/tarefa` | delete, identity from `?id=` |
//!
//! Natural-key resources use a text parameter (`/usuario/{id}`) and take
//! the query identity from their key field (`?email=`).

use crate::collection::SharedCollection;
use crate::dispatcher::{Dispatcher, Input, Reply};
use crate::record::{Identity, Key};
use crate::{Error, Result};
use serde_json::{json, Map, Value};

/// Name of the path parameter carrying the identity
const ID_PARAM: &str = "id";

/// Identity from the path, falling back to the query string
fn target_key(input: &Input, identity: &Identity) -> Result<Key> {
    let raw = input
        .param(ID_PARAM)
        .map(str::to_string)
        .or_else(|| input.query.get(identity.field()).cloned())
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| Error::ValidationFailed(format!("O campo '{}' é obrigatório", identity.field())))?;
    identity.parse_key(&raw)
}

fn list_reply(plural: &str, records: Vec<Map<String, Value>>) -> Reply {
    let total = records.len();
    let mut body = Map::new();
    body.insert(plural.to_string(), Value::Array(records.into_iter().map(Value::Object).collect()));
    body.insert("total".to_string(), json!(total));
    Reply::ok(Value::Object(body))
}

/// Register the CRUD routes for `collection`
pub fn register(dispatcher: &mut Dispatcher, collection: SharedCollection) -> Result<()> {
    let (name, plural, identity) = {
        let guard = collection.read();
        let schema = guard.schema();
        (schema.name.clone(), schema.plural.clone(), schema.identity.clone())
    };

    let base = format!("/{}", name);
    let item = match identity {
        Identity::Auto { .. } => format!("/{}/{{{}:int}}", name, ID_PARAM),
        Identity::Natural { .. } => format!("/{}/{{{}}}", name, ID_PARAM),
    };

    // GET /name: list, or single read by query identity
    {
        let collection = collection.clone();
        let identity = identity.clone();
        dispatcher.get(&base, move |input| {
            let by_key = input
                .query
                .get(identity.field())
                .filter(|raw| !raw.trim().is_empty());
            if let Some(raw) = by_key {
                let key = identity.parse_key(raw)?;
                let record = collection.read().get(&key)?;
                return Ok(Reply::ok(Value::Object(record)));
            }
            let records = collection.read().list(&input.query)?;
            Ok(list_reply(&plural, records))
        })?;
    }

    // GET /name/{id}
    {
        let collection = collection.clone();
        let identity = identity.clone();
        dispatcher.get(&item, move |input| {
            let key = target_key(input, &identity)?;
            let record = collection.read().get(&key)?;
            Ok(Reply::ok(Value::Object(record)))
        })?;
    }

    // POST /name
    {
        let collection = collection.clone();
        dispatcher.post(&base, move |input| {
            let record = collection.write().create(&input.fields())?;
            Ok(Reply::created(Value::Object(record)))
        })?;
    }

    // PUT /name/{id} and PUT /name?id=
    for pattern in [&item, &base] {
        let collection = collection.clone();
        let identity = identity.clone();
        dispatcher.put(pattern, move |input| {
            let key = target_key(input, &identity)?;
            let record = collection.write().update(&key, &input.fields())?;
            Ok(Reply::ok(Value::Object(record)))
        })?;
    }

    // DELETE /name/{id} and DELETE /name?id=
    for pattern in [&item, &base] {
        let collection = collection.clone();
        let identity = identity.clone();
        dispatcher.delete(pattern, move |input| {
            let key = target_key(input, &identity)?;
            let mut guard = collection.write();
            guard.delete(&key)?;
            Ok(Reply::ok(json!({ "mensagem": guard.schema().messages.deleted })))
        })?;
    }

    tracing::debug!(resource = %name, "crud routes registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::record::{FieldKind, FieldSpec, ResourceSchema};
    use crate::{Collection, Dispatcher, Method, Request, RequestBuilder, StatusCode};
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let mut d = Dispatcher::new();
        d.resource(Collection::shared(
            ResourceSchema::new("tarefa", "tarefas", "Tarefa")
                .field(FieldSpec::required("titulo", FieldKind::Text))
                .field(FieldSpec::with_default("concluida", FieldKind::Boolean, false))
                .deleted_message("Tarefa deletada com sucesso")
                .not_found_message("Tarefa não encontrada"),
        ))
        .unwrap();
        d.resource(Collection::shared(
            ResourceSchema::new("usuario", "usuarios", "Usuário")
                .natural_key("email")
                .field(FieldSpec::required("nome", FieldKind::Text)),
        ))
        .unwrap();
        d
    }

    #[test]
    fn test_registers_seven_routes_per_resource() {
        assert_eq!(dispatcher().route_count(), 14);
    }

    #[test]
    fn test_create_via_query_string() {
        let d = dispatcher();
        let res = d.dispatch(Request::from_target(Method::Post, "/tarefa?titulo=Estudar"));
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(
            res.body_string().unwrap(),
            r#"{"id":1,"titulo":"Estudar","concluida":false}"#
        );
    }

    #[test]
    fn test_read_by_path_and_query() {
        let d = dispatcher();
        d.dispatch(Request::from_target(Method::Post, "/tarefa?titulo=a"));

        let by_path = d.dispatch(Request::from_target(Method::Get, "/tarefa/1"));
        let by_query = d.dispatch(Request::from_target(Method::Get, "/tarefa?id=1"));
        assert_eq!(by_path.status, StatusCode::OK);
        assert_eq!(by_path.body_json().unwrap(), by_query.body_json().unwrap());

        let res = d.dispatch(Request::from_target(Method::Get, "/tarefa?id=um"));
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_list_envelope_and_filter() {
        let d = dispatcher();
        d.dispatch(Request::from_target(Method::Post, "/tarefa?titulo=a"));
        d.dispatch(Request::from_target(Method::Post, "/tarefa?titulo=b&concluida=true"));

        let res = d.dispatch(Request::from_target(Method::Get, "/tarefa"));
        let body = res.body_json().unwrap();
        assert_eq!(body["total"], json!(2));
        assert_eq!(body["tarefas"][1]["titulo"], json!("b"));

        let res = d.dispatch(Request::from_target(Method::Get, "/tarefa?concluida=true"));
        assert_eq!(res.body_json().unwrap()["total"], json!(1));
    }

    #[test]
    fn test_update_and_delete_via_query() {
        let d = dispatcher();
        d.dispatch(Request::from_target(Method::Post, "/tarefa?titulo=a"));

        let res = d.dispatch(Request::from_target(Method::Put, "/tarefa?id=1&concluida=1"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_json().unwrap()["concluida"], json!(true));

        let res = d.dispatch(Request::from_target(Method::Delete, "/tarefa?id=1"));
        assert_eq!(res.body_json().unwrap(), json!({"mensagem": "Tarefa deletada com sucesso"}));

        let res = d.dispatch(Request::from_target(Method::Delete, "/tarefa"));
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_natural_key_routes() {
        let d = dispatcher();
        let create = RequestBuilder::new(Method::Post, "/usuario")
            .json(&json!({"email": "ana@exemplo.com", "nome": "Ana"}))
            .build();
        assert_eq!(d.dispatch(create).status, StatusCode::CREATED);

        let res = d.dispatch(Request::from_target(Method::Get, "/usuario/ana%40exemplo.com"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_json().unwrap()["nome"], json!("Ana"));

        let res = d.dispatch(Request::from_target(Method::Delete, "/usuario?email=ana@exemplo.com"));
        assert_eq!(res.body_json().unwrap(), json!({"mensagem": "Usuário deletado com sucesso"}));
    }

    #[test]
    fn test_non_numeric_id_is_not_routed() {
        let d = dispatcher();
        let res = d.dispatch(Request::from_target(Method::Get, "/tarefa/abc"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
