pub mod click_event;
pub mod click_total;

pub use click_event::Entity as ClickEventEntity;
pub use click_total::Entity as ClickTotalEntity;
