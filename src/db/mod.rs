pub mod health;
#[cfg(test)]
pub mod mock_db;
pub mod organization_repository;
pub mod postgres_organization_repository;
pub mod postgres_project_repository;
pub mod postgres_proposal_repository;
pub mod postgres_subscription_repository;
pub mod postgres_usage_repository;
pub mod postgres_user_repository;
pub mod project_repository;
pub mod proposal_repository;
pub mod subscription_repository;
pub mod usage_repository;
pub mod user_repository;
