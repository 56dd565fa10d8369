use std::{path::Path, sync::Arc};

use crate::{
    backend::memory::MemoryBackend,
    infra::{self, config::FileConfigAdapter, contracts::ConfigAdapter, error::AppError},
    usecases::{
        context::AppContext,
        contracts::{CredentialProvider, WriteApi},
        identity::{IdentityResolver, InMemoryIdentityCache},
        list_conversations::ConversationListAggregator,
        message_stream::MessageStreamAdapter,
        read_state::ReadStateTracker,
        session::SessionServices,
    },
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let context = build_context(&FileConfigAdapter::new(config_path))?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok(context.with_log_guard(guard))
}

fn build_context(config_adapter: &dyn ConfigAdapter) -> Result<AppContext, AppError> {
    let config = config_adapter.load().map_err(AppError::Other)?;

    Ok(AppContext::new(config))
}

/// Wires the sync engine to an in-memory store. Writes go through
/// `write_api`, which may be the same store or a remote client.
pub fn compose_session_services(
    store: &MemoryBackend,
    write_api: Arc<dyn WriteApi>,
    credentials: Arc<dyn CredentialProvider>,
) -> SessionServices {
    let store = Arc::new(store.clone());
    let identities = IdentityResolver::new(store.clone(), Arc::new(InMemoryIdentityCache::default()));
    let receipts = ReadStateTracker::new(store.clone());

    SessionServices {
        conversations: ConversationListAggregator::new(store.clone(), identities.clone()),
        messages: MessageStreamAdapter::new(store.clone(), identities.clone(), receipts.clone()),
        identities,
        receipts,
        profiles: store,
        write_api,
        credentials,
    }
}
