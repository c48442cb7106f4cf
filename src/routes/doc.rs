use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        blogs::CreateBlogRequest,
        products::{FilterRequest, ProductForm},
        reviews::CreateReviewRequest,
    },
    models::{
        BlogPost, Category, Product, ProductSummary, Review, ReviewAuthor, ReviewWithAuthor,
        Role, User,
    },
    response::{ErrorBody, MessageResponse, ProductPage},
    routes::{blogs, categories, health, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        users::register,
        users::login,
        users::current_user,
        categories::list_categories,
        categories::get_category,
        products::search_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::list_all_products,
        products::top_products,
        products::new_products,
        products::filter_products,
        products::distributor_products,
        products::similar_products,
        products::add_review,
        products::list_reviews,
        blogs::create_blog,
        blogs::list_blogs,
        blogs::get_blog
    ),
    components(
        schemas(
            User,
            Role,
            Category,
            Product,
            ProductSummary,
            Review,
            ReviewAuthor,
            ReviewWithAuthor,
            BlogPost,
            ProductForm,
            FilterRequest,
            CreateReviewRequest,
            CreateBlogRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            params::SearchQuery,
            ProductPage,
            MessageResponse,
            ErrorBody,
            health::HealthData
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Users", description = "Registration and authentication"),
        (name = "Blog", description = "Blog endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
