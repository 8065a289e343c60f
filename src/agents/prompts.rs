//! Prompt templates for routing and answering.

/// Ask the chat model whether a question is about the uploaded documents
#[inline]
pub fn classification_prompt(question: &str) -> String {
    format!(
        "Classify the question below as either 'friendly' or 'pdf'.\n\
         If it relates to uploaded documents or technical context, return 'pdf'.\n\
         Otherwise, return 'friendly'.\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Answer:\n"
    )
}

/// Answer strictly from retrieved context
#[inline]
pub fn document_prompt(context: &str, history: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Use the following context to answer the question.\n\
         If the answer isn't found in the context, say \"I don't know\".\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Chat History:\n\
         {history}\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Answer:\n"
    )
}

/// Light conversation without retrieval
#[inline]
pub fn friendly_prompt(history: &str, question: &str) -> String {
    format!(
        "You are a friendly chatbot. Engage in light, supportive conversation.\n\
         \n\
         Chat History:\n\
         {history}\n\
         \n\
         User: {question}\n\
         Bot:"
    )
}
