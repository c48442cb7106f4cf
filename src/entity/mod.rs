pub mod blogs;
pub mod categories;
pub mod products;
pub mod reviews;
pub mod users;

pub use blogs::Entity as Blogs;
pub use categories::Entity as Categories;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
