use crate::models::{ChatMessage, InvoiceRecord};

/// Session state for one chat session: the generated dataset, the conversation,
/// the current follow-up suggestions and the upstream credential. Owned by the
/// single control task; the core operations borrow it.
pub struct AppState {
    pub api_key: String,
    pub base_url: String,
    pub dataset: Vec<InvoiceRecord>,
    pub conversation: Vec<ChatMessage>,
    pub suggested_questions: Vec<String>,
    pub request_in_flight: bool,
}

impl AppState {
    pub fn new(api_key: String, base_url: String) -> Self {
        AppState {
            api_key,
            base_url,
            dataset: Vec::new(),
            conversation: Vec::new(),
            suggested_questions: Vec::new(),
            request_in_flight: false,
        }
    }

    pub fn clear_conversation(&mut self) {
        self.conversation.clear();
        self.suggested_questions.clear();
    }
}
