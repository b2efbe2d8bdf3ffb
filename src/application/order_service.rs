use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::dto::{
    CreateOrderRequest, OrderListRequest, OrderSource, OrderView, PagedOrders,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus};
use crate::ports::{CartReader, CatalogReader, OrderRepository};

/// Owns the order aggregate: atomic creation from either source, lookups,
/// and administrative status moves.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogReader>,
    carts: Arc<dyn CartReader>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogReader>,
        carts: Arc<dyn CartReader>,
    ) -> Self {
        Self {
            orders,
            catalog,
            carts,
        }
    }

    /// Creates an order from exactly one of the two sources. Every
    /// referenced catalog entry must resolve; a miss aborts with nothing
    /// persisted. Totals are computed server-side only.
    pub async fn create_order(
        &self,
        user_id: &str,
        request: CreateOrderRequest,
    ) -> DomainResult<OrderView> {
        let (receiver, source) = request.into_source()?;

        let requested: Vec<(String, u32)> = match source {
            OrderSource::Items(items) => items
                .into_iter()
                .map(|line| (line.product_item_id, line.quantity))
                .collect(),
            OrderSource::Cart(uuids) => self.resolve_cart(user_id, &uuids).await?,
        };

        let mut lines: Vec<(String, u32, Money, Money)> = Vec::with_capacity(requested.len());
        for (product_item_id, quantity) in requested {
            let item = self
                .catalog
                .find_item(&product_item_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", &product_item_id))?;
            lines.push((product_item_id, quantity, item.price, item.discount));
        }

        let (order, items) = Order::new(user_id.to_string(), receiver, lines)?;
        self.orders.create(&order, &items).await?;
        info!(order_no = %order.order_no, total = %order.total_amount, "order created");

        Ok(OrderView::from_order(order, &items))
    }

    /// Expands cart uuids into `(product_item_id, quantity)` pairs. The
    /// cart rows themselves are left untouched. Lines for the same product
    /// are merged.
    async fn resolve_cart(
        &self,
        user_id: &str,
        uuids: &[String],
    ) -> DomainResult<Vec<(String, u32)>> {
        let entries = self.carts.find_entries(user_id, uuids).await?;
        let found: HashMap<&str, &crate::ports::CartEntry> =
            entries.iter().map(|e| (e.uuid.as_str(), e)).collect();
        for uuid in uuids {
            if !found.contains_key(uuid.as_str()) {
                return Err(DomainError::not_found("cart entry", uuid));
            }
        }

        let mut merged: Vec<(String, u32)> = Vec::new();
        for entry in &entries {
            match merged
                .iter_mut()
                .find(|(id, _)| *id == entry.product_item_id)
            {
                Some((_, qty)) => *qty += entry.quantity,
                None => merged.push((entry.product_item_id.clone(), entry.quantity)),
            }
        }
        debug!(user_id, entries = entries.len(), "cart resolved");
        Ok(merged)
    }

    pub async fn get_order(&self, user_id: &str, order_no: &str) -> DomainResult<OrderView> {
        let order = self.find_owned(user_id, order_no).await?;
        let items = self.orders.find_items(order_no).await?;
        Ok(OrderView::from_order(order, &items))
    }

    pub async fn list_orders(
        &self,
        user_id: &str,
        request: &OrderListRequest,
    ) -> DomainResult<PagedOrders> {
        let page = request.page.max(1);
        let page_size = request.page_size.clamp(1, 100);
        let (orders, total) = self.orders.list_for_user(user_id, page, page_size).await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.orders.find_items(&order.order_no).await?;
            views.push(OrderView::from_order(order, &items));
        }
        Ok(PagedOrders {
            total,
            orders: views,
        })
    }

    /// Administrative forward move (delivered/completed/closed, or paid by
    /// an operator). Validation happens on the in-memory aggregate, the
    /// repository then persists status plus the stamped timestamp.
    pub async fn advance_order(&self, order_no: &str, target: OrderStatus) -> DomainResult<()> {
        let mut order = self
            .orders
            .find_by_order_no(order_no)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_no))?;
        order.advance(target)?;
        self.orders.advance_status(&order, target).await?;
        info!(order_no, status = %target, "order advanced");
        Ok(())
    }

    pub async fn delete_order(&self, order_no: &str) -> DomainResult<()> {
        if self.orders.find_by_order_no(order_no).await?.is_none() {
            return Err(DomainError::not_found("order", order_no));
        }
        self.orders.delete(order_no).await?;
        info!(order_no, "order deleted");
        Ok(())
    }

    async fn find_owned(&self, user_id: &str, order_no: &str) -> DomainResult<Order> {
        let order = self
            .orders
            .find_by_order_no(order_no)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_no))?;
        if order.user_id != user_id {
            // Do not leak existence of other users' orders.
            return Err(DomainError::not_found("order", order_no));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::OrderLineInput;
    use crate::application::test_support::{InMemoryCarts, InMemoryCatalog, InMemoryOrders};
    use crate::domain::order::Receiver;
    use crate::ports::{CartEntry, CatalogItem};

    fn service() -> (OrderService, Arc<InMemoryOrders>, Arc<InMemoryCarts>) {
        let orders = Arc::new(InMemoryOrders::default());
        let catalog = Arc::new(InMemoryCatalog::with_items(vec![
            CatalogItem {
                id: "prod-a".into(),
                name: "A".into(),
                price: Money::from_major(10),
                discount: Money::ZERO,
            },
            CatalogItem {
                id: "prod-b".into(),
                name: "B".into(),
                price: Money::from_major(15),
                discount: Money::ZERO,
            },
        ]));
        let carts = Arc::new(InMemoryCarts::with_entries(vec![
            CartEntry {
                uuid: "cart-1".into(),
                user_id: "user-1".into(),
                product_item_id: "prod-a".into(),
                quantity: 2,
            },
            CartEntry {
                uuid: "cart-2".into(),
                user_id: "user-1".into(),
                product_item_id: "prod-b".into(),
                quantity: 1,
            },
        ]));
        let service = OrderService::new(orders.clone(), catalog, carts.clone());
        (service, orders, carts)
    }

    fn items_request(lines: Vec<(&str, u32)>) -> CreateOrderRequest {
        CreateOrderRequest {
            receiver: Receiver::default(),
            items: Some(
                lines
                    .into_iter()
                    .map(|(id, q)| OrderLineInput {
                        product_item_id: id.into(),
                        quantity: q,
                    })
                    .collect(),
            ),
            cart_uuids: None,
        }
    }

    #[tokio::test]
    async fn explicit_items_total() {
        let (service, _, _) = service();
        let view = service
            .create_order("user-1", items_request(vec![("prod-a", 2), ("prod-b", 1)]))
            .await
            .unwrap();
        assert_eq!(view.total_amount, Money::from_major(35));
        let sum = view
            .items
            .iter()
            .fold(Money::ZERO, |acc, i| acc.checked_add(i.total_amount).unwrap());
        assert_eq!(view.total_amount, sum);
    }

    #[tokio::test]
    async fn cart_path_matches_entries_and_leaves_cart_alone() {
        let (service, _, carts) = service();
        let request = CreateOrderRequest {
            receiver: Receiver::default(),
            items: None,
            cart_uuids: Some(vec!["cart-1".into(), "cart-2".into()]),
        };
        let view = service.create_order("user-1", request).await.unwrap();
        assert_eq!(view.total_amount, Money::from_major(35));
        assert_eq!(view.items.len(), 2);
        // Cart rows are consumed read-only.
        assert_eq!(carts.entry_count(), 2);
    }

    #[tokio::test]
    async fn missing_product_persists_nothing() {
        let (service, orders, _) = service();
        let err = service
            .create_order("user-1", items_request(vec![("prod-a", 1), ("ghost", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(orders.order_count(), 0);
    }

    #[tokio::test]
    async fn unknown_cart_uuid_rejected() {
        let (service, orders, _) = service();
        let request = CreateOrderRequest {
            receiver: Receiver::default(),
            items: None,
            cart_uuids: Some(vec!["cart-1".into(), "ghost".into()]),
        };
        assert!(service.create_order("user-1", request).await.is_err());
        assert_eq!(orders.order_count(), 0);
    }

    #[tokio::test]
    async fn both_sources_rejected_before_side_effects() {
        let (service, orders, _) = service();
        let request = CreateOrderRequest {
            receiver: Receiver::default(),
            items: Some(vec![OrderLineInput {
                product_item_id: "prod-a".into(),
                quantity: 1,
            }]),
            cart_uuids: Some(vec!["cart-1".into()]),
        };
        let err = service.create_order("user-1", request).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(orders.order_count(), 0);
    }

    #[tokio::test]
    async fn other_users_orders_are_invisible() {
        let (service, _, _) = service();
        let view = service
            .create_order("user-1", items_request(vec![("prod-a", 1)]))
            .await
            .unwrap();
        let err = service.get_order("user-2", &view.order_no).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn advance_rejects_backward_moves() {
        let (service, _, _) = service();
        let view = service
            .create_order("user-1", items_request(vec![("prod-a", 1)]))
            .await
            .unwrap();
        service
            .advance_order(&view.order_no, OrderStatus::Paid)
            .await
            .unwrap();
        let err = service
            .advance_order(&view.order_no, OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
