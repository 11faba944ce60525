//! `shiptrack-lark`: Lark Suite collaborator.
//!
//! Reads shipment rows out of Lark Sheets, writes status and delivery date
//! cells back, and posts the run summary card to a group chat.

pub mod client;
pub mod render;
pub mod sheet;

pub use client::{LarkClient, LarkError, SheetTab};
pub use render::{card_content, render_report};
pub use sheet::SheetLayout;
