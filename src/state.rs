use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    images::ImageHost,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: Arc<OrmConn>,
    pub images: Arc<dyn ImageHost>,
    pub jwt_secret: Arc<str>,
}
