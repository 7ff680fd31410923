use tracing_call_log::call_args;
use tracing_call_log::instrument::{AsyncInstrumentedCall, SyncInstrumentedCall};
use tracing_call_log::logger::get_logger;

fn add(a: i32, b: i32) -> Result<i32, String> {
    Ok(a + b)
}

async fn fetch_greeting(user: &str) -> Result<String, String> {
    tokio::task::yield_now().await;
    Ok(format!("hello, {}", user))
}

fn flaky() -> Result<i32, String> {
    Err("downstream unavailable".to_string())
}

#[tokio::main]
async fn main() {
    let logger = get_logger("demo.instrumented");

    let add_call = SyncInstrumentedCall::new("add", file!(), logger.clone());
    let sum = add_call.invoke(call_args![3, 4], || add(3, 4));
    let _ = logger.info(format!("sum is {}", sum.unwrap_or_default())).await;

    let greet_call = AsyncInstrumentedCall::new("fetch_greeting", file!(), logger.clone());
    let greeting = greet_call
        .invoke(call_args!["bob"], fetch_greeting("bob"))
        .await;
    let _ = logger.info(greeting.unwrap_or_default()).await;

    // Set the LOGGING_EMAIL_* variables to also get this failure mailed.
    let flaky_call = SyncInstrumentedCall::new("flaky", file!(), logger).send_email(true);
    if let Err(err) = flaky_call.invoke(call_args![], flaky) {
        eprintln!("flaky failed as expected: {}", err);
    }

    // Let the detached notification attempt finish before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
}
