use uuid::Uuid;

use crate::{error::CoreError, state::AppState};

pub async fn balance(state: &AppState, user_id: Uuid) -> Result<i64, CoreError> {
    state.store.balance(user_id).await
}
