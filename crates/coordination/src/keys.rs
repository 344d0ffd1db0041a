//! Lock key namespaces. The wallet lock serializes all trades per execution
//! wallet; the signal and message locks prevent redundant work on one row.

pub fn wallet_trade(wallet_address: &str) -> String {
    format!("wallet-trade:{}", wallet_address)
}

pub fn signal_deployment(signal_id: &str, deployment_id: &str) -> String {
    format!("signal-deployment:{}:{}", signal_id, deployment_id)
}

pub fn message_classify(message_id: &str) -> String {
    format!("message-classify:{}", message_id)
}
