//! Aggregates module
pub mod order;
pub mod commission;
pub mod user;
pub mod post;

pub use order::{NewOrder, NewOrderItem, Order, OrderAggregate, OrderDraft, OrderError, OrderItem, OrderItemDraft, OrderStatus, Transition};
pub use commission::{Commission, CommissionStatus, NewCommission};
pub use user::{User, UserProfile};
pub use post::{CommentRow, CommentView, FeedRow, Post, PostView};
