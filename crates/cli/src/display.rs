// SwapperD Desktop CLI - Display helpers
// Tables for balances, swaps, transfers and approval prompts

use chrono::{Local, TimeZone};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use serde_json::Value;
use swapperd_desktop_common::ipc::PendingSwap;
use swapperd_desktop_common::swapperd::{Balances, SwapItem, TransferItem};

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| {
            Cell::new(title)
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan)
        })
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(titles));
    table
}

/// SwapperD swap status codes
pub fn swap_status_label(status: i32) -> (&'static str, Color) {
    match status {
        0..=2 => ("pending", Color::Yellow),
        4 => ("confirmed", Color::Green),
        6 => ("canceled", Color::DarkGrey),
        _ => ("failed", Color::Red),
    }
}

pub fn format_timestamp(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

pub fn balances_table(balances: &Balances) -> Table {
    let mut table = new_table(&["Token", "Balance", "Address"]);
    for (token, balance) in balances {
        table.add_row(vec![
            Cell::new(token).add_attribute(Attribute::Bold),
            Cell::new(&balance.balance),
            Cell::new(&balance.address),
        ]);
    }
    table
}

pub fn swaps_table(swaps: &[SwapItem]) -> Table {
    let mut table = new_table(&["Time", "Send", "Receive", "Status", "ID"]);
    for swap in swaps {
        let (label, color) = swap_status_label(swap.status);
        table.add_row(vec![
            Cell::new(format_timestamp(swap.timestamp)),
            Cell::new(format!(
                "{} {}",
                swap.send_amount,
                swap.send_token.as_deref().unwrap_or("?")
            )),
            Cell::new(format!(
                "{} {}",
                swap.receive_amount,
                swap.receive_token.as_deref().unwrap_or("?")
            )),
            Cell::new(label).fg(color),
            Cell::new(&swap.id),
        ]);
    }
    table
}

pub fn transfers_table(transfers: &[TransferItem]) -> Table {
    let mut table = new_table(&["Time", "Amount", "To", "Confirmations", "Tx"]);
    for transfer in transfers {
        table.add_row(vec![
            Cell::new(format_timestamp(transfer.timestamp)),
            Cell::new(format!("{} {}", transfer.value, transfer.token.name)),
            Cell::new(&transfer.to),
            Cell::new(transfer.confirmations),
            Cell::new(&transfer.tx_hash),
        ]);
    }
    table
}

fn field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or("-")
}

/// Swap details shown before asking for approval
pub fn swap_prompt_table(swap: &PendingSwap) -> Table {
    let body = &swap.request.body;
    let mut table = new_table(&["", ""]);
    let rows = [
        ("Origin", swap.request.origin.as_deref().unwrap_or("unknown").to_string()),
        (
            "Network",
            swap.request
                .network
                .map(|n| n.label().to_string())
                .unwrap_or_else(|| "selected network".to_string()),
        ),
        ("Send", format!("{} {}", field(body, "sendAmount"), field(body, "sendToken"))),
        (
            "Receive",
            format!("{} {}", field(body, "receiveAmount"), field(body, "receiveToken")),
        ),
        ("Approval", swap.approval_id.to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    table
}
