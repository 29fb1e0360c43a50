pub mod loyalty;
pub mod operator;
pub mod orders;
pub mod settings;
pub mod storefront;

use chrono::{Local, NaiveDateTime};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
