pub mod auth_service;
pub mod blog_service;
pub mod catalog_service;
pub mod category_service;
pub mod product_service;
pub mod review_service;
