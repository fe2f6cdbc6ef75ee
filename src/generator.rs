use crate::error::GenerationError;
use crate::model::{GenerationResult, QueryParams};
use crate::router::ProviderRouter;
use tracing::info;

const INSTRUCTIONS: &str = r#"<instructions>
You are a JavaScript module generator. Given a function signature or description, generate a complete ES module.

<requirements>
1. Export the requested function(s) using ES module syntax
2. The code must be functional and executable
3. Include realistic implementations, not just stubs
4. Handle edge cases appropriately
5. Use modern JavaScript features
6. Return ONLY the JavaScript code, no explanations or markdown
</requirements>

<examples>
<example>
<input>formatCurrency(amount:number,currency?:string):string</input>
<output>
export function formatCurrency(amount, currency = 'USD') {
  const formatter = new Intl.NumberFormat('en-US', {
    style: 'currency',
    currency: currency
  });
  return formatter.format(amount);
}
</output>
</example>

<example>
<input>chunk<T>(array:T[],size:number):T[][]</input>
<output>
export function chunk(array, size) {
  const result = [];
  for (let i = 0; i < array.length; i += size) {
    result.push(array.slice(i, i + size));
  }
  return result;
}
</output>
</example>
</examples>
</instructions>

Generate a complete ES module for the following request:"#;

pub struct ModuleGenerator {
    router: ProviderRouter,
}

impl ModuleGenerator {
    pub fn new(router: ProviderRouter) -> Self {
        Self { router }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        params: &QueryParams,
    ) -> Result<GenerationResult, GenerationError> {
        let full_prompt = compose_prompt(prompt);
        let result = self.router.generate(&full_prompt, params).await?;

        let content = result.content.trim();
        if !content.starts_with("export") {
            return Err(GenerationError::MalformedOutput {
                provider: result.provider,
            });
        }

        info!(provider = %result.provider, bytes = content.len(), "Generated module");
        Ok(GenerationResult {
            content: content.to_string(),
            provider: result.provider,
        })
    }
}

fn compose_prompt(prompt: &str) -> String {
    format!("{INSTRUCTIONS}\n\n{prompt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderKind;
    use crate::router::provider::fake::{client, FakeTransport};
    use std::sync::Arc;

    fn generator(primary: &Arc<FakeTransport>, fallback: &Arc<FakeTransport>) -> ModuleGenerator {
        ModuleGenerator::new(ProviderRouter::new(
            client(ProviderKind::Primary, primary.clone()),
            client(ProviderKind::Fallback, fallback.clone()),
            false,
        ))
    }

    #[test]
    fn prompt_follows_instructions_after_blank_line() {
        let composed = compose_prompt("add(a,b)");
        assert!(composed.starts_with("<instructions>"));
        assert!(composed.ends_with("following request:\n\nadd(a,b)"));
    }

    #[tokio::test]
    async fn accepts_module_starting_with_export() {
        let primary = FakeTransport::ok("export function add(a, b) {\n  return a + b;\n}\n");
        let fallback = FakeTransport::ok("unused");

        let result = generator(&primary, &fallback)
            .generate("add(a,b)", &QueryParams::default())
            .await
            .unwrap();

        assert_eq!(result.provider, ProviderKind::Primary);
        assert!(result.content.starts_with("export function add"));
        assert!(result.content.ends_with('}'));
    }

    #[tokio::test]
    async fn sends_composed_prompt_upstream() {
        let primary = FakeTransport::ok("export {}");
        let fallback = FakeTransport::ok("export {}");

        generator(&primary, &fallback)
            .generate("add(a,b)", &QueryParams::default())
            .await
            .unwrap();

        let urls = primary.urls.lock().unwrap();
        let segment = urls[0].path_segments().unwrap().next().unwrap().to_string();
        assert!(segment.starts_with("%3Cinstructions%3E"));
        assert!(segment.ends_with("%0A%0Aadd(a,b)"));
    }

    #[tokio::test]
    async fn rejects_prose_instead_of_module() {
        let primary = FakeTransport::ok("Sure! Here is your function:\nexport function add() {}");
        let fallback = FakeTransport::ok("export {}");

        let err = generator(&primary, &fallback)
            .generate("add(a,b)", &QueryParams::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::MalformedOutput {
                provider: ProviderKind::Primary
            }
        ));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failures_surface_as_provider_error() {
        let primary = FakeTransport::unreachable();
        let fallback = FakeTransport::unreachable();

        let err = generator(&primary, &fallback)
            .generate("add(a,b)", &QueryParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Provider(_)));
    }
}
