//! Scripted fakes shared by the application unit tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    adapters::outbound::templating::HandlebarsRenderer,
    core::{
        domain::normalize_model_key,
        error::{Error, Result},
        ports::{FetchedPage, LlmClient, LlmRegistry, LlmResponse, PromptRenderer, SiteProbe},
    },
};

type Responder = Box<dyn Fn(&str) -> Result<LlmResponse> + Send + Sync>;

pub struct FakeLlm {
    name: String,
    responder: Responder,
    calls: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn with(
        name: &str,
        responder: impl Fn(&str) -> Result<LlmResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(name: &str, reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::with(name, move |_| Ok(LlmResponse::Text(reply.clone())))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        let provider = name.to_string();
        Self::with(name, move |_| Err(Error::llm(provider.clone(), "boom")))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        self.calls.lock().unwrap().push(prompt.to_string());
        (self.responder)(prompt)
    }
}

pub struct FakeRegistry {
    clients: BTreeMap<String, Arc<FakeLlm>>,
    fallback: Arc<FakeLlm>,
}

impl FakeRegistry {
    pub fn new(clients: Vec<Arc<FakeLlm>>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
            fallback: FakeLlm::replying("fallback", "[]"),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<FakeLlm>) -> Self {
        self.fallback = fallback;
        self
    }
}

impl LlmRegistry for FakeRegistry {
    fn acquire(&self, key: &str) -> Result<Arc<dyn LlmClient>> {
        let key = normalize_model_key(key);
        self.clients
            .get(&key)
            .map(|c| c.clone() as Arc<dyn LlmClient>)
            .ok_or(Error::UnsupportedProvider(key))
    }

    fn supports(&self, key: &str) -> bool {
        self.clients.contains_key(&normalize_model_key(key))
    }

    fn discovery_fallback(&self) -> Arc<dyn LlmClient> {
        self.fallback.clone()
    }
}

/// Site probe with a fixed answer for every host.
pub struct FakeProbe {
    pub resolves: bool,
    pub page: Result<FetchedPage>,
}

impl FakeProbe {
    pub fn page(status: u16, body: &str) -> Self {
        Self {
            resolves: true,
            page: Ok(FetchedPage {
                status,
                body: body.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SiteProbe for FakeProbe {
    async fn resolves(&self, _hostname: &str) -> bool {
        self.resolves
    }

    async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
        match &self.page {
            Ok(page) => Ok(page.clone()),
            Err(err) => Err(Error::Network(err.to_string())),
        }
    }
}

pub fn renderer() -> Arc<dyn PromptRenderer> {
    Arc::new(HandlebarsRenderer::new())
}
