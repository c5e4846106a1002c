use chrono::Utc;
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord, ReturnStatus};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};

use super::filter_compiler::CompiledQuery;
use crate::shared::data::db::get_connection;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "a001_marketplace_returns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub order_id: String,
    pub claim_id: String,
    pub product_title: String,
    pub sku: String,
    pub claim_type: Option<String>,
    pub status_devolucao: Option<String>,
    pub priority: Option<String>,
    pub moderation_status: Option<String>,
    pub escalated_to_marketplace: bool,
    pub in_mediation: bool,
    pub seller_action_required: bool,
    pub unread_messages: Option<i32>,
    pub attachments_count: Option<i32>,
    pub retained_value: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub compensation_value: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub total_resolution_time: Option<f64>,
    pub satisfaction: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub action_due_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tracking_code: Option<String>,
    pub automatic_tags: Option<Json>,
    pub claim_data: Option<Json>,
    pub order_data: Option<Json>,
    pub return_data: Option<Json>,
    pub messages_data: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Теги хранятся JSON-массивом; не-строковые элементы отбрасываются
fn tags_from_json(value: Option<Json>) -> Vec<String> {
    value
        .as_ref()
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl From<Model> for ReturnRecord {
    fn from(m: Model) -> Self {
        // Неизвестные коды статуса/приоритета читаются как отсутствующие
        let status = m.status_devolucao.as_deref().and_then(ReturnStatus::from_code);
        let priority = m.priority.as_deref().and_then(ReturnPriority::from_code);

        ReturnRecord {
            id: m.id,
            account_id: m.account_id,
            order_id: m.order_id,
            claim_id: m.claim_id,
            product_title: m.product_title,
            sku: m.sku,
            claim_type: m.claim_type,
            status,
            priority,
            moderation_status: m.moderation_status,
            escalated_to_marketplace: m.escalated_to_marketplace,
            in_mediation: m.in_mediation,
            seller_action_required: m.seller_action_required,
            unread_messages: m.unread_messages,
            attachments_count: m.attachments_count,
            retained_value: m.retained_value,
            shipping_cost: m.shipping_cost,
            compensation_value: m.compensation_value,
            avg_response_time: m.avg_response_time,
            total_resolution_time: m.total_resolution_time,
            satisfaction: m.satisfaction,
            created_at: m.created_at,
            action_due_at: m.action_due_at,
            tracking_code: m.tracking_code,
            automatic_tags: tags_from_json(m.automatic_tags),
            claim_data: m.claim_data,
            order_data: m.order_data,
            return_data: m.return_data,
            messages_data: m.messages_data,
        }
    }
}

fn conn() -> &'static DatabaseConnection {
    get_connection()
}

/// Выборка по скомпилированному запросу; `now` подставляется в условие просрочки
pub async fn fetch(query: &CompiledQuery, now: chrono::DateTime<Utc>) -> anyhow::Result<Vec<ReturnRecord>> {
    let items = query
        .to_select(now)
        .all(conn())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(items)
}

/// Количество записей по условиям запроса без учета страницы
pub async fn count(query: &CompiledQuery, now: chrono::DateTime<Utc>) -> anyhow::Result<u64> {
    let total = Entity::find()
        .filter(query.to_condition(now))
        .count(conn())
        .await?;
    Ok(total)
}

pub async fn count_by_account(account_id: &str) -> anyhow::Result<u64> {
    let total = Entity::find()
        .filter(Column::AccountId.eq(account_id))
        .count(conn())
        .await?;
    Ok(total)
}

/// Все аккаунты, по которым есть возвраты
pub async fn list_account_ids() -> anyhow::Result<Vec<String>> {
    let mut ids: Vec<String> = Entity::find()
        .select_only()
        .column(Column::AccountId)
        .distinct()
        .into_tuple::<String>()
        .all(conn())
        .await?;
    ids.sort();
    Ok(ids)
}

pub async fn get_by_id(id: &str) -> anyhow::Result<Option<ReturnRecord>> {
    let result = Entity::find_by_id(id.to_string()).one(conn()).await?;
    Ok(result.map(Into::into))
}

/// Отметить сообщения прочитанными
pub async fn mark_read(ids: &[String]) -> anyhow::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Entity::update_many()
        .col_expr(Column::UnreadMessages, Expr::value(0))
        .filter(Column::Id.is_in(ids.to_vec()))
        .exec(conn())
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_priority(ids: &[String], priority: ReturnPriority) -> anyhow::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Entity::update_many()
        .col_expr(Column::Priority, Expr::value(priority.code()))
        .filter(Column::Id.is_in(ids.to_vec()))
        .exec(conn())
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_seller_action_required(ids: &[String], required: bool) -> anyhow::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Entity::update_many()
        .col_expr(Column::SellerActionRequired, Expr::value(required))
        .filter(Column::Id.is_in(ids.to_vec()))
        .exec(conn())
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_marketplace_return::filter_compiler;
    use crate::shared::data::db::create_schema;
    use chrono::TimeZone;
    use contracts::shared::return_filters::{FilterCriteria, ViewSettings};
    use sea_orm::{ActiveValue::Set, ConnectOptions, Database};
    use serde_json::json;

    fn active(record: &ReturnRecord) -> ActiveModel {
        ActiveModel {
            id: Set(record.id.clone()),
            account_id: Set(record.account_id.clone()),
            order_id: Set(record.order_id.clone()),
            claim_id: Set(record.claim_id.clone()),
            product_title: Set(record.product_title.clone()),
            sku: Set(record.sku.clone()),
            claim_type: Set(record.claim_type.clone()),
            status_devolucao: Set(record.status.map(|s| s.code().to_string())),
            priority: Set(record.priority.map(|p| p.code().to_string())),
            moderation_status: Set(record.moderation_status.clone()),
            escalated_to_marketplace: Set(record.escalated_to_marketplace),
            in_mediation: Set(record.in_mediation),
            seller_action_required: Set(record.seller_action_required),
            unread_messages: Set(record.unread_messages),
            attachments_count: Set(record.attachments_count),
            retained_value: Set(record.retained_value),
            shipping_cost: Set(record.shipping_cost),
            compensation_value: Set(record.compensation_value),
            avg_response_time: Set(record.avg_response_time),
            total_resolution_time: Set(record.total_resolution_time),
            satisfaction: Set(record.satisfaction),
            created_at: Set(record.created_at),
            action_due_at: Set(record.action_due_at),
            tracking_code: Set(record.tracking_code.clone()),
            automatic_tags: Set(None),
            claim_data: Set(None),
            order_data: Set(None),
            return_data: Set(None),
            messages_data: Set(None),
        }
    }

    #[tokio::test]
    async fn test_sql_search_agrees_with_in_memory_filter() {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        create_schema(&db).await.unwrap();

        let base = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let titles = [
            ("r-1", "TÊNIS DE CORRIDA", "TN-01"),
            ("r-2", "Tênis infantil", "TN-02"),
            ("r-3", "Camiseta", "50%-OFF"),
            ("r-4", "Kit 50 peças", "KT-50"),
            ("r-5", "Bolsa_couro", "BL-01"),
            ("r-6", "Bolsa couro", "BL-02"),
        ];
        let records: Vec<ReturnRecord> = titles
            .iter()
            .enumerate()
            .map(|(i, (id, title, sku))| {
                let mut r = ReturnRecord::new(*id, "acc-1", base - chrono::Duration::hours(i as i64));
                r.product_title = title.to_string();
                r.sku = sku.to_string();
                r
            })
            .collect();
        Entity::insert_many(records.iter().map(active))
            .exec_without_returning(&db)
            .await
            .unwrap();

        for search in ["tênis", "TÊNIS", "50%", "a_c", "bolsa_", "corrida"] {
            let criteria = FilterCriteria {
                account_ids: vec!["acc-1".into()],
                search: Some(search.into()),
                ..Default::default()
            };
            let query = filter_compiler::compile(&criteria, &ViewSettings::default(), 50).unwrap();
            let in_memory: Vec<String> = query
                .apply(&records, base)
                .into_iter()
                .map(|r| r.id)
                .collect();
            let from_sql: Vec<String> = query
                .to_select(base)
                .all(&db)
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect();
            assert_eq!(from_sql, in_memory, "search {search:?}");
        }

        let tenis = FilterCriteria {
            account_ids: vec!["acc-1".into()],
            search: Some("tênis".into()),
            ..Default::default()
        };
        let query = filter_compiler::compile(&tenis, &ViewSettings::default(), 50).unwrap();
        assert_eq!(query.to_select(base).all(&db).await.unwrap().len(), 2);
    }

    fn model() -> Model {
        Model {
            id: "r-1".into(),
            account_id: "acc-1".into(),
            order_id: "2000001".into(),
            claim_id: "5000001".into(),
            product_title: "Tênis de corrida".into(),
            sku: "TN-42".into(),
            claim_type: Some("return".into()),
            status_devolucao: Some("waiting_seller".into()),
            priority: Some("urgent".into()),
            moderation_status: None,
            escalated_to_marketplace: true,
            in_mediation: false,
            seller_action_required: true,
            unread_messages: Some(2),
            attachments_count: None,
            retained_value: Some(-120.5),
            shipping_cost: None,
            compensation_value: None,
            avg_response_time: Some(30.0),
            total_resolution_time: None,
            satisfaction: None,
            created_at: Utc::now(),
            action_due_at: None,
            tracking_code: None,
            automatic_tags: Some(json!(["atraso", 3, "foto"])),
            claim_data: Some(json!({"reason": {"description": "Defeito"}})),
            order_data: None,
            return_data: None,
            messages_data: None,
        }
    }

    #[test]
    fn test_model_to_record_conversion() {
        let record: ReturnRecord = model().into();
        assert_eq!(record.status, Some(ReturnStatus::WaitingSeller));
        // unknown priority code is read as absent
        assert_eq!(record.priority, None);
        assert_eq!(record.automatic_tags, vec!["atraso", "foto"]);
        assert_eq!(record.retained_value, Some(-120.5));
        assert!(record.claim_data.is_some());
    }
}
