//! Terminal rendering for server records.

use shared::{
    format_amount, CompanySummary, FeedEvent, MessageInfo, OrderInfo, OrderStats, SavedCompany,
    ServiceInfo, ThreadSummary,
};

const DIM: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Keep the first `max` characters, with an ellipsis when cut
pub fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

pub fn company_line(company: &CompanySummary) -> String {
    format!(
        "{BOLD}{:<10}{RESET} {}  {DIM}[{}] CS due {} | accounts due {}{RESET}",
        company.company_number,
        company.company_name,
        or_dash(&company.company_status),
        or_dash(&company.confirmation_statement_due),
        or_dash(&company.accounts_due),
    )
}

pub fn saved_company_line(company: &SavedCompany) -> String {
    let star = if company.is_favorite { "★" } else { " " };
    format!(
        "{} {:<10} {}  {DIM}id {} | CS due {} | accounts due {}{RESET}",
        star,
        company.company_number,
        company.company_name,
        company.id,
        or_dash(&company.confirmation_statement_due),
        or_dash(&company.accounts_due),
    )
}

pub fn service_line(service: &ServiceInfo, currency: &str) -> String {
    let inactive = if service.is_active { "" } else { " (inactive)" };
    format!(
        "{:<28} {:>10}  {DIM}{}{}{RESET}",
        service.slug,
        format_amount(service.base_price, currency),
        service.title,
        inactive,
    )
}

pub fn order_line(order: &OrderInfo) -> String {
    let companies: Vec<&str> = order
        .metadata
        .items
        .iter()
        .map(|item| item.company_number.as_str())
        .fold(Vec::new(), |mut acc, number| {
            if !acc.contains(&number) {
                acc.push(number);
            }
            acc
        });
    format!(
        "{} {:>10}  {:<10} {:<8} {}  {DIM}{} {}{RESET}",
        order.id,
        format_amount(order.amount, &order.currency),
        order.status.as_str(),
        order.payment_status.as_str(),
        companies.join(","),
        order.service_type,
        order.created_at.as_deref().unwrap_or_default(),
    )
}

pub fn order_detail(order: &OrderInfo) -> String {
    let mut out = vec![
        format!("{BOLD}Order {}{RESET}", order.id),
        format!("Status:   {} (payment {})", order.status, order.payment_status),
        format!("Amount:   {}", format_amount(order.amount, &order.currency)),
        format!("Created:  {}", order.created_at.as_deref().unwrap_or("-")),
    ];
    if let Some(intent) = &order.stripe_payment_intent_id {
        out.push(format!("Payment:  {}", intent));
    }
    out.push("Items:".to_string());
    for item in &order.metadata.items {
        out.push(format!(
            "  {:<10} {:<30} {:>10}",
            item.company_number,
            item.service_title,
            format_amount(item.price, &order.currency)
        ));
    }
    if let Some(notes) = &order.metadata.notes {
        out.push(format!("Notes:    {}", notes));
    }
    out.join("\n")
}

pub fn message_line(message: &MessageInfo) -> String {
    let who = if message.is_admin { "support" } else { "customer" };
    let mut line = format!(
        "{DIM}{}{RESET} {BOLD}{}{RESET}: {}",
        message.created_at.as_deref().unwrap_or_default(),
        who,
        message.message_text,
    );
    for attachment in &message.attachments {
        line.push_str(&format!(
            "\n    📎 {} ({} bytes) {}",
            attachment.file_name, attachment.size, attachment.path
        ));
    }
    line
}

pub fn thread_line(thread: &ThreadSummary) -> String {
    let unread = if thread.unread_by_admin > 0 {
        format!(" \x1b[33m{} unread{RESET}", thread.unread_by_admin)
    } else {
        String::new()
    };
    format!(
        "{} {DIM}{} msgs, last {}{RESET}{}\n    {}",
        thread.order_id,
        thread.message_count,
        thread.last_message_at.as_deref().unwrap_or("-"),
        unread,
        truncate(&thread.last_message, 70),
    )
}

pub fn stats_block(stats: &OrderStats, currency: &str) -> String {
    format!(
        "Total orders:     {}\nCompleted:        {}\nPending:          {}\nRevenue (paid):   {}",
        stats.total_orders,
        stats.completed_orders,
        stats.pending_orders,
        format_amount(stats.revenue, currency),
    )
}

/// One line per feed event worth showing; keep-alives are skipped
pub fn feed_event(event: &FeedEvent) -> Option<String> {
    match event {
        FeedEvent::Subscribed { order_id } => {
            Some(format!("{DIM}Watching order {}{RESET}", order_id))
        }
        FeedEvent::Unsubscribed { order_id } => {
            Some(format!("{DIM}Stopped watching order {}{RESET}", order_id))
        }
        FeedEvent::NewMessage { message } => {
            Some(format!("[{}] {}", message.order_id, message_line(message)))
        }
        FeedEvent::MessagesRead { order_id, by_admin } => {
            let who = if *by_admin { "support" } else { "customer" };
            Some(format!("{DIM}[{}] read by {}{RESET}", order_id, who))
        }
        FeedEvent::Pong => None,
        FeedEvent::Error { message } => Some(format!("\x1b[31m{}{RESET}", message)),
    }
}
