pub(crate) mod forecast_controller;
pub(crate) mod health_check_controller;
pub(crate) mod sale_controller;
