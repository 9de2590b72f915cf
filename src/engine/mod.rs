pub mod accept;
pub mod courier_orders;
pub mod dispatch;
pub mod lifecycle;
pub mod offer_log;
pub mod order_book;
pub mod presence;
pub mod queue;
pub mod reconciler;
pub mod timers;
