//! Handlers for the account, catalogue, order and admin subcommands.

use anyhow::{bail, Context, Result};
use reqwest::Method;
use shared::{
    format_amount, Ack, AdminOrdersResponse, Attachment, CachedCompany, CartItem,
    CompanySummary, CreateOrderResponse, CreateServiceRequest, MarkReadRequest,
    MarkReadResponse, MessageInfo, OrderInfo, OrderStats, OrderStatus, PaymentStatus,
    ProfileInfo, SaveCompanyRequest, SavedCompany, SearchResults, SendMessageRequest,
    ServiceInfo, ThreadSummary, UnreadCount, UpdateOrderRequest, UpdateProfileRequest,
    UpdateServiceRequest,
};
use std::path::PathBuf;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::display;
use crate::store::Store;
use crate::{
    AdminAction, BulkAction, CartAction, CompaniesAction, MessagesAction, OrdersAction,
    ProfileAction,
};

/// Prices are shown in the shop's currency
const DISPLAY_CURRENCY: &str = "gbp";

/// Match a service by slug (case-insensitive) or by id
pub fn find_service<'a>(services: &'a [ServiceInfo], key: &str) -> Option<&'a ServiceInfo> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        return services.iter().find(|s| s.id == id);
    }
    services.iter().find(|s| s.slug.eq_ignore_ascii_case(key))
}

fn resolve_services<'a>(services: &'a [ServiceInfo], keys: &[String]) -> Result<Vec<&'a ServiceInfo>> {
    keys.iter()
        .map(|key| {
            find_service(services, key)
                .with_context(|| format!("Unknown service '{}'. Run 'filings services' to list them.", key))
        })
        .collect()
}

async fn lookup_company(client: &ApiClient, number: &str) -> Result<CompanySummary> {
    let number = number.trim().to_uppercase();
    let company = client
        .get(&format!("/api/companies/lookup/{}", number))
        .await?;
    Ok(company)
}

pub async fn profile(client: &ApiClient, action: ProfileAction) -> Result<()> {
    let profile: ProfileInfo = match action {
        ProfileAction::Show => client.get("/api/profile").await?,
        ProfileAction::Set {
            full_name,
            company_name,
            phone,
        } => {
            let request = UpdateProfileRequest {
                full_name,
                company_name,
                phone_number: phone,
            };
            client.send(Method::PUT, "/api/profile", &request).await?
        }
    };

    println!("Name:     {}", profile.full_name.unwrap_or_default());
    println!("Company:  {}", profile.company_name.unwrap_or_default());
    println!("Phone:    {}", profile.phone_number.unwrap_or_default());
    Ok(())
}

pub async fn search(client: &ApiClient, query: &str, start: u64) -> Result<()> {
    let start = start.to_string();
    let results: SearchResults = client
        .get_query(
            "/api/companies/search-external",
            &[("q", query), ("start_index", start.as_str())],
        )
        .await?;

    if results.items.is_empty() {
        println!("No companies found");
        return Ok(());
    }
    for company in &results.items {
        println!("{}", display::company_line(company));
    }
    println!(
        "\x1b[90mShowing {}-{} of {}\x1b[0m",
        results.start_index + 1,
        results.start_index + results.items.len() as u64,
        results.total_results
    );
    Ok(())
}

pub async fn companies(client: &ApiClient, action: CompaniesAction) -> Result<()> {
    match action {
        CompaniesAction::List => {
            let companies: Vec<SavedCompany> = client.get("/api/companies").await?;
            if companies.is_empty() {
                println!("No saved companies. Use 'filings companies save <number>'.");
            }
            for company in &companies {
                println!("{}", display::saved_company_line(company));
            }
        }
        CompaniesAction::Save { number } => {
            let company = lookup_company(client, &number).await?;
            let saved: SavedCompany = client
                .post("/api/companies", &SaveCompanyRequest::from(company))
                .await?;
            println!("\x1b[32m✓\x1b[0m Saved {}", saved.company_name);
        }
        CompaniesAction::Remove { id } => {
            let ack: Ack = client.delete(&format!("/api/companies/{}", id)).await?;
            println!("{}", ack.message);
        }
        CompaniesAction::Favorite { id } => {
            let saved: SavedCompany = client
                .post(&format!("/api/companies/{}/favorite", id), &serde_json::json!({}))
                .await?;
            println!("{}", display::saved_company_line(&saved));
        }
    }
    Ok(())
}

pub async fn services(client: &ApiClient) -> Result<()> {
    let services: Vec<ServiceInfo> = client.get("/api/services").await?;
    for service in &services {
        println!("{}", display::service_line(service, DISPLAY_CURRENCY));
    }
    Ok(())
}

pub async fn cart(client: &ApiClient, store: &Store, action: CartAction) -> Result<()> {
    let mut cart = store.cart()?;

    match action {
        CartAction::Add {
            company,
            name,
            services,
        } => {
            let catalogue: Vec<ServiceInfo> = client.get("/api/services").await?;
            let chosen = resolve_services(&catalogue, &services)?;
            let number = company.trim().to_uppercase();
            let name = match name {
                Some(name) => name,
                None => lookup_company(client, &number).await?.company_name,
            };

            for service in chosen {
                if cart.add(CartItem::new(service, &number, &name)) {
                    println!("Added {} for {}", service.title, name);
                } else {
                    println!("{} for {} is already in the cart", service.title, name);
                }
            }
            store.save_cart(&cart)?;
        }
        CartAction::Remove { company, service } => {
            let service_id = match Uuid::parse_str(service.trim()) {
                Ok(id) => id,
                Err(_) => {
                    let catalogue: Vec<ServiceInfo> = client.get("/api/services").await?;
                    find_service(&catalogue, &service)
                        .map(|s| s.id)
                        .with_context(|| format!("Unknown service '{}'", service))?
                }
            };
            if cart.remove(service_id, company.trim()) {
                store.save_cart(&cart)?;
                println!("Removed");
            } else {
                println!("Not in the cart");
            }
        }
        CartAction::Show => print_cart(&cart),
        CartAction::Clear => {
            cart.clear();
            store.save_cart(&cart)?;
            println!("Cart cleared");
        }
        CartAction::Checkout => {
            if cart.is_empty() {
                bail!("The cart is empty");
            }
            // Placed orders leave the saved cart at once, so a later failure never re-orders them
            for request in cart.to_order_requests() {
                let created: CreateOrderResponse = client.post("/api/orders", &request).await?;
                cart.remove_ordered(&request);
                store.save_cart(&cart)?;
                println!(
                    "\x1b[32m✓\x1b[0m Order {} for {} ({})",
                    created.order.id,
                    request.company_name,
                    format_amount(created.order.amount, &created.order.currency)
                );
                if let Some(secret) = created.client_secret {
                    println!("  \x1b[90mpayment client secret: {}\x1b[0m", secret);
                }
            }
            println!("Run 'filings orders confirm <id>' once payment is complete.");
        }
    }
    Ok(())
}

fn print_cart(cart: &shared::Cart) {
    if cart.is_empty() {
        println!("The cart is empty");
        return;
    }
    for item in cart.items() {
        println!(
            "{:<10} {:<30} {:<30} {:>10}",
            item.company_number,
            display::truncate(&item.company_name, 30),
            item.service_title,
            format_amount(item.price, DISPLAY_CURRENCY)
        );
    }
    println!("Total: {}", format_amount(cart.total(), DISPLAY_CURRENCY));
}

pub async fn orders(client: &ApiClient, action: OrdersAction) -> Result<()> {
    match action {
        OrdersAction::List => {
            let orders: Vec<OrderInfo> = client.get("/api/orders").await?;
            if orders.is_empty() {
                println!("No orders yet");
            }
            for order in &orders {
                println!("{}", display::order_line(order));
            }
        }
        OrdersAction::Show { id } => {
            let order: OrderInfo = client.get(&format!("/api/orders/{}", id)).await?;
            println!("{}", display::order_detail(&order));
        }
        OrdersAction::Confirm { id } => {
            let order: OrderInfo = client
                .post(&format!("/api/orders/{}/confirm", id), &serde_json::json!({}))
                .await?;
            println!(
                "Order {} is {} (payment {})",
                order.id, order.status, order.payment_status
            );
        }
    }
    Ok(())
}

async fn upload_all(client: &ApiClient, order_id: Uuid, paths: &[PathBuf]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        let attachment = client.upload(order_id, path).await?;
        tracing::debug!("Uploaded {} as {}", path.display(), attachment.path);
        attachments.push(attachment);
    }
    Ok(attachments)
}

async fn post_message(
    client: &ApiClient,
    path: &str,
    order_id: Uuid,
    text: String,
    files: &[PathBuf],
) -> Result<MessageInfo> {
    if text.trim().is_empty() && files.is_empty() {
        bail!("Nothing to send: give a message or --attach a file");
    }
    let attachments = upload_all(client, order_id, files).await?;
    let request = SendMessageRequest {
        order_id,
        message_text: text,
        attachments,
    };
    Ok(client.post(path, &request).await?)
}

fn print_thread(messages: &[MessageInfo]) {
    if messages.is_empty() {
        println!("No messages yet");
    }
    for message in messages {
        println!("{}", display::message_line(message));
    }
}

pub async fn messages(client: &ApiClient, action: MessagesAction) -> Result<()> {
    match action {
        MessagesAction::List { order } => {
            let messages: Vec<MessageInfo> =
                client.get(&format!("/api/orders/{}/messages", order)).await?;
            print_thread(&messages);
        }
        MessagesAction::Send {
            order,
            text,
            attachments,
        } => {
            let message =
                post_message(client, "/api/messages/send", order, text, &attachments).await?;
            println!("{}", display::message_line(&message));
        }
        MessagesAction::Read { order } => {
            let resp: MarkReadResponse = client
                .post("/api/messages/mark-read", &MarkReadRequest { order_id: order })
                .await?;
            println!("Marked {} message(s) read", resp.updated);
        }
        MessagesAction::Unread => {
            let count: UnreadCount = client.get("/api/messages/unread-count").await?;
            println!("{}", count.unread);
        }
        MessagesAction::Watch { orders } => {
            let token = client.token()?;
            crate::watch::run(client.base_url(), token, &orders).await?;
        }
    }
    Ok(())
}

pub async fn bulk(client: &ApiClient, store: &Store, action: BulkAction) -> Result<()> {
    let mut selection = store.selection()?;

    match action {
        BulkAction::SelectCompany { number } => {
            let number = number.trim().to_uppercase();
            let company = if selection.is_company_selected(&number) {
                CompanySummary {
                    company_number: number,
                    ..Default::default()
                }
            } else {
                lookup_company(client, &number).await?
            };
            let name = company.company_name.clone();
            let label = if name.is_empty() { company.company_number.clone() } else { name };
            if selection.toggle_company(company) {
                println!("Selected {}", label);
            } else {
                println!("Deselected {}", label);
            }
            store.save_selection(&selection)?;
        }
        BulkAction::SelectService { service } => {
            let catalogue: Vec<ServiceInfo> = client.get("/api/services").await?;
            let found = find_service(&catalogue, &service)
                .with_context(|| format!("Unknown service '{}'", service))?;
            if selection.toggle_service(found.id) {
                println!("Selected {}", found.title);
            } else {
                println!("Deselected {}", found.title);
            }
            store.save_selection(&selection)?;
        }
        BulkAction::Show => {
            println!("Companies:");
            for company in selection.companies() {
                println!("  {}", display::company_line(company));
            }
            println!("Services:");
            for id in selection.service_ids() {
                println!("  {}", id);
            }
        }
        BulkAction::Clear => {
            selection.clear();
            store.save_selection(&selection)?;
            println!("Selection cleared");
        }
        BulkAction::Download { output } => {
            if !selection.is_ready() {
                bail!("Select at least one company and one service first");
            }
            let bytes = client
                .post_bytes("/api/documents/bulk", &selection.to_request())
                .await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("Could not write {}", output.display()))?;
            println!(
                "\x1b[32m✓\x1b[0m Wrote {} documents to {}",
                selection.companies().len(),
                output.display()
            );
        }
    }
    Ok(())
}

pub async fn admin(client: &ApiClient, action: AdminAction) -> Result<()> {
    match action {
        AdminAction::Stats => {
            let stats: OrderStats = client.get("/api/admin/orders/stats").await?;
            println!("{}", display::stats_block(&stats, DISPLAY_CURRENCY));
        }
        AdminAction::Orders { status, limit } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(status) = status {
                query.push(("status", status));
            }
            if let Some(limit) = limit {
                query.push(("limit", limit.to_string()));
            }
            let resp: AdminOrdersResponse = client.get_query("/api/admin/orders", &query).await?;
            for order in &resp.orders {
                println!("{}", display::order_line(order));
            }
            println!();
            println!("{}", display::stats_block(&resp.stats, DISPLAY_CURRENCY));
        }
        AdminAction::Update {
            order,
            status,
            payment_status,
        } => {
            let request = UpdateOrderRequest {
                status: status.as_deref().map(str::parse::<OrderStatus>).transpose()?,
                payment_status: payment_status
                    .as_deref()
                    .map(str::parse::<PaymentStatus>)
                    .transpose()?,
            };
            if request.status.is_none() && request.payment_status.is_none() {
                bail!("Give --status and/or --payment-status");
            }
            let updated: OrderInfo = client
                .send(Method::PATCH, &format!("/api/admin/orders/{}", order), &request)
                .await?;
            println!("{}", display::order_line(&updated));
        }
        AdminAction::Threads => {
            let threads: Vec<ThreadSummary> = client.get("/api/admin/messages").await?;
            if threads.is_empty() {
                println!("No conversations");
            }
            for thread in &threads {
                println!("{}", display::thread_line(thread));
            }
        }
        AdminAction::Messages { order } => {
            let messages: Vec<MessageInfo> = client
                .get(&format!("/api/admin/orders/{}/messages", order))
                .await?;
            print_thread(&messages);
        }
        AdminAction::Reply {
            order,
            text,
            attachments,
        } => {
            let message =
                post_message(client, "/api/admin/messages/send", order, text, &attachments)
                    .await?;
            println!("{}", display::message_line(&message));
        }
        AdminAction::Read { order } => {
            let resp: MarkReadResponse = client
                .post("/api/admin/messages/mark-read", &MarkReadRequest { order_id: order })
                .await?;
            println!("Marked {} message(s) read", resp.updated);
        }
        AdminAction::Services => {
            let services: Vec<ServiceInfo> = client.get("/api/admin/services").await?;
            for service in &services {
                println!("{}  {}", service.id, display::service_line(service, DISPLAY_CURRENCY));
            }
        }
        AdminAction::ServiceCreate {
            title,
            price,
            slug,
            category,
            inactive,
        } => {
            let request = CreateServiceRequest {
                title,
                slug,
                base_price: price,
                is_active: !inactive,
                category,
            };
            let service: ServiceInfo = client.post("/api/admin/services", &request).await?;
            println!("Created {} ({})", service.slug, service.id);
        }
        AdminAction::ServiceUpdate {
            id,
            title,
            price,
            slug,
            category,
            active,
        } => {
            let request = UpdateServiceRequest {
                title,
                slug,
                base_price: price,
                is_active: active,
                category,
            };
            let service: ServiceInfo = client
                .send(Method::PUT, &format!("/api/admin/services/{}", id), &request)
                .await?;
            println!("{}", display::service_line(&service, DISPLAY_CURRENCY));
        }
        AdminAction::ServiceDelete { id } => {
            let ack: Ack = client.delete(&format!("/api/admin/services/{}", id)).await?;
            println!("{}", ack.message);
        }
        AdminAction::Companies => {
            let cached: Vec<CachedCompany> = client.get("/api/admin/companies/cache").await?;
            for company in &cached {
                println!(
                    "{:<10} {}  \x1b[90mupdated {}\x1b[0m",
                    company.company_number,
                    company.company_name,
                    company.updated_at.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
