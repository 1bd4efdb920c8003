use automation_model::{CancelSignal, WorkspaceVariable};
use futures_util::future::BoxFuture;
use stream_api::{
    AutomationApiClient, ByteStream, ChatRequest, CommitPayload, CommitReceipt, StreamApiError,
};

use crate::commit::CommitBackend;
use crate::engine::{ChatTransport, VariableStore};

impl ChatTransport for AutomationApiClient {
    fn open(
        &self,
        request: ChatRequest,
        cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<ByteStream, StreamApiError>> {
        Box::pin(async move { self.open_byte_stream(&request, Some(&cancel)).await })
    }
}

impl CommitBackend for AutomationApiClient {
    fn commit(
        &self,
        payload: CommitPayload,
    ) -> BoxFuture<'_, Result<CommitReceipt, StreamApiError>> {
        Box::pin(async move { AutomationApiClient::commit(self, &payload).await })
    }
}

impl VariableStore for AutomationApiClient {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<WorkspaceVariable>, StreamApiError>> {
        Box::pin(self.fetch_workspace_variables())
    }
}
