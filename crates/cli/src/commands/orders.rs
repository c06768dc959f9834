use brickbot_core::domain::{order::Order, slot::SlotName};
use brickbot_db::{OrderRepository, SqlOrderRepository};
use serde::Serialize;

use serde_json::Value;

use crate::commands::{load_config, open_pool, runtime, to_data, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct OrderRow {
    id: String,
    lego_model: String,
    lego_size: String,
    created_at: String,
}

impl From<Order> for OrderRow {
    fn from(order: Order) -> Self {
        Self {
            lego_model: order.value(SlotName::LegoModel).unwrap_or_default().to_string(),
            lego_size: order.value(SlotName::LegoSize).unwrap_or_default().to_string(),
            created_at: order.created_at.to_rfc3339(),
            id: order.id.0,
        }
    }
}

pub fn run(limit: u32) -> CommandResult {
    let config = match load_config("orders") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("orders") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let repo = SqlOrderRepository::new(pool.clone());
        let orders = repo
            .list_recent(limit)
            .await
            .map_err(|error| ("repository", error.to_string(), 6u8))?;
        pool.close().await;
        let rows: Vec<OrderRow> = orders.into_iter().map(OrderRow::from).collect();
        let count = rows.len();
        Ok::<(usize, Value), Failure>((count, to_data(rows)?))
    });

    match result {
        Ok((count, rows)) => {
            CommandResult::success_with_data("orders", format!("{count} order(s)"), Some(rows))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("orders", error_class, message, exit_code)
        }
    }
}
