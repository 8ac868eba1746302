use lambda_http::{run, service_fn, tracing, Error};
mod config;
mod http_handler;
#[cfg(test)]
mod memory;
mod store;
mod todo;
use config::Config;
use http_handler::function_handler;
use store::DynamoStore;
use todo::Lifecycle;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = aws_sdk_dynamodb::Client::new(&sdk_config);
    let store = DynamoStore::new(&client, &config.table_name);
    let lifecycle = Lifecycle::system();

    run(service_fn(|event| function_handler(&store, &lifecycle, event))).await
}
