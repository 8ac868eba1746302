use aws_sdk_dynamodb::error::DisplayErrorContext;
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use serde::de::Unexpected;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::store::{StoreError, TodoStore};
use crate::todo::{Lifecycle, TodoInput};

const TODO_NOT_FOUND: &str = "Todo not found";

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode response body")]
    Json(#[from] serde_json::Error),
    #[error("failed to build response")]
    Http(#[from] lambda_http::http::Error),
}

fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Body>, HandlerError> {
    let body = serde_json::to_string(body)?;
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::Text(body))?)
}

fn message(status: StatusCode, message: &str) -> Result<Response<Body>, HandlerError> {
    json_response(status, &json!({ "message": message }))
}

/// Absent or blank bodies read as `{}`. Anything other than a JSON object is
/// rejected so arrays are never decoded positionally.
fn parse_body(event: &Request) -> Result<TodoInput, serde_json::Error> {
    let body: &[u8] = event.body().as_ref();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TodoInput::default());
    }
    match serde_json::from_slice::<Value>(body)? {
        object @ Value::Object(_) => serde_json::from_value(object),
        other => Err(serde::de::Error::invalid_type(
            unexpected(&other),
            &"a JSON object",
        )),
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn invalid_body(err: serde_json::Error) -> Result<Response<Body>, HandlerError> {
    warn!(error = %err, "rejecting malformed request body");
    message(StatusCode::BAD_REQUEST, "Invalid JSON body")
}

async fn dispatch<S: TodoStore>(
    store: &S,
    lifecycle: &Lifecycle,
    event: &Request,
    id: Option<&str>,
) -> Result<Response<Body>, HandlerError> {
    match (event.method(), id) {
        (&Method::GET, None) => {
            let todos = store.list_all().await?;
            json_response(StatusCode::OK, &todos)
        }
        (&Method::GET, Some(id)) => match store.get(id).await? {
            Some(todo) => json_response(StatusCode::OK, &todo),
            None => message(StatusCode::NOT_FOUND, TODO_NOT_FOUND),
        },
        (&Method::POST, _) => {
            let input = match parse_body(event) {
                Ok(input) => input,
                Err(e) => return invalid_body(e),
            };
            let todo = lifecycle.create(input);
            store.put(&todo).await?;
            json_response(StatusCode::CREATED, &todo)
        }
        (&Method::PUT, Some(id)) => {
            let input = match parse_body(event) {
                Ok(input) => input,
                Err(e) => return invalid_body(e),
            };
            match store.update(id, &lifecycle.revise(input)).await? {
                Some(todo) => json_response(StatusCode::OK, &todo),
                None => message(StatusCode::NOT_FOUND, TODO_NOT_FOUND),
            }
        }
        (&Method::DELETE, Some(id)) => {
            store.delete(id).await?;
            Ok(Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Body::Empty)?)
        }
        (&Method::PUT, None) | (&Method::DELETE, None) => {
            message(StatusCode::BAD_REQUEST, "Missing ID")
        }
        _ => message(StatusCode::BAD_REQUEST, "Unsupported method"),
    }
}

/// Entry point for every API Gateway route. The record id comes from the
/// gateway's `{id}` path parameter; an empty parameter counts as absent.
pub(crate) async fn function_handler<S: TodoStore>(
    store: &S,
    lifecycle: &Lifecycle,
    event: Request,
) -> Result<Response<Body>, Error> {
    let params = event.path_parameters();
    let id = params.first("id").filter(|id| !id.is_empty());
    let request_id = event
        .lambda_context_ref()
        .map(|ctx| ctx.request_id.as_str())
        .unwrap_or_default();

    info!(
        method = %event.method(),
        todo_id = id.unwrap_or_default(),
        request_id,
        "handling request"
    );

    match dispatch(store, lifecycle, &event, id).await {
        Ok(response) => Ok(response),
        Err(err) => {
            error!(
                error = %DisplayErrorContext(&err),
                method = %event.method(),
                request_id,
                "request failed"
            );
            Ok(message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")?)
        }
    }
}
