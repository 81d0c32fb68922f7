pub mod app_form;
pub mod generate;
pub mod health;
pub mod webhook;
