/// Present in every answer the assistant returns.
pub const DISCLAIMER_MARKER: &str = "⚠️ **Important**";

/// Longest user question forwarded to the language model, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4_000;

pub const OFFLINE_FALLBACK: &str = "I am currently operating in offline mode because the medical knowledge service is not configured.

Based on general medical knowledge about brain tumors:
- Brain tumors can be benign (non-cancerous) or malignant (cancerous).
- Common symptoms include headaches, seizures, vision problems and balance issues.
- Diagnosis typically involves MRI scans, CT scans and biopsies.
- Treatment options often include surgery, radiation therapy and chemotherapy.

For specific advice about your condition or the uploaded MRI scan, please consult a qualified neurologist or oncologist.

⚠️ **Important**: I am an AI assistant and cannot provide a medical diagnosis. I am not a substitute for professional medical advice.";

pub const SERVICE_APOLOGY: &str = "I apologize, but I'm experiencing technical difficulties connecting to the medical knowledge service. Please try again later.

⚠️ **Important**: I am an AI assistant and not a substitute for professional medical advice. Always consult a qualified healthcare provider for any medical concerns.";

const DISCLAIMER_FOOTER: &str = "⚠️ **Important**: I am an AI assistant and not a substitute for professional medical advice. Please consult a qualified healthcare provider about your situation.";

pub fn system_instruction(context: &str) -> String {
    format!(
        "You are a highly knowledgeable and empathetic medical expert specializing in brain tumors and neurology.
Your role is to answer questions strictly related to brain tumors, MRI scans, symptoms, treatments and general brain health.

Guidelines:
1. Scope restriction: ONLY answer questions about medical topics, specifically neurology and brain tumors. If the user asks about anything else (for example coding, general knowledge or sports), politely decline and remind them that you are a medical assistant.
2. Provide accurate, medically grounded information.
3. Be empathetic and supportive in your tone.
4. Explain complex medical terms in simple, understandable language.
5. ALWAYS include a disclaimer that you are an AI and not a substitute for professional medical advice. Start it with \"{marker}\".
6. If asked for a diagnosis from a text description, stress the need for medical imaging and professional evaluation.
7. You can discuss:
   - Types of brain tumors (glioma, meningioma, pituitary and others)
   - Symptoms and warning signs
   - Diagnostic procedures (MRI, CT scans, biopsy)
   - Treatment options (surgery, radiation, chemotherapy)
   - Recovery and support

Context provided: {context}",
        marker = DISCLAIMER_MARKER,
        context = context,
    )
}

pub fn build_prompt(message: &str, context: &str) -> String {
    format!(
        "{}\n\nUser Question: {}",
        system_instruction(context),
        clamp_message(message)
    )
}

fn clamp_message(message: &str) -> &str {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => {
            log::warn!(
                "Chat message longer than {} characters, truncating",
                MAX_MESSAGE_CHARS
            );
            &message[..cut]
        }
        None => message,
    }
}

pub fn ensure_disclaimer(answer: &str) -> String {
    if answer.contains(DISCLAIMER_MARKER) {
        answer.to_string()
    } else {
        format!("{}\n\n{}", answer.trim_end(), DISCLAIMER_FOOTER)
    }
}
