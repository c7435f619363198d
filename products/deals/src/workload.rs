//! Live load figures used by team scoring and task distribution. Always read
//! from the store; nothing is cached.

use entity::{deals, tasks, users};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

/// Number of tasks assigned to the user that are not completed.
pub async fn get_user_workload<C>(db: &C, user_id: Uuid) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    tasks::Entity::find()
        .filter(tasks::Column::AssignedTo.eq(user_id))
        .filter(tasks::Column::Status.ne(tasks::Status::Completed))
        .count(db)
        .await
}

/// Number of active deals the user leads (by display name) or staffs (by
/// pod team user id). Unknown users have no deals.
pub async fn get_active_deals_count<C>(db: &C, user_id: Uuid) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let Some(user) = users::Entity::find_by_id(user_id).one(db).await? else {
        return Ok(0);
    };
    let active = deals::Entity::find()
        .filter(deals::Column::Status.eq(deals::DealStatus::Active))
        .all(db)
        .await?;
    Ok(active
        .iter()
        .filter(|deal| deal.involves(user.id, &user.name))
        .count() as u64)
}
