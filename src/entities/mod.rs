//! sea-orm entities for the marketplace lifecycle core.

pub mod crop;
pub mod delivery;
pub mod delivery_request;
pub mod order;
pub mod user;

pub use crop::Entity as Crop;
pub use delivery::Entity as Delivery;
pub use delivery_request::Entity as DeliveryRequest;
pub use order::Entity as Order;
pub use user::Entity as User;
