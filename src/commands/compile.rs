use colored::*;
use std::path::Path;
use teto::assets::LocalAssetResolver;
use teto::compiler::ScriptCompiler;
use teto::effects::EffectRegistry;
use teto::error::TetoResult;
use teto::script::Script;
use teto::tts::cache::TtsCache;
use teto::tts::mock::MockProvider;

pub fn run(script_path: &Path, output_dir: &Path) -> TetoResult<()> {
    let data = std::fs::read_to_string(script_path)?;
    let script = Script::from_json(&data)?;

    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    let assets = LocalAssetResolver::new(base_dir);
    let tts = MockProvider;
    let cache = TtsCache::new(TtsCache::resolve_root(None));
    let effects = EffectRegistry::with_builtins();
    let compiler = ScriptCompiler::new(&tts, &cache, &assets, &effects);

    std::fs::create_dir_all(output_dir)?;
    let results = compiler.compile_all(&script, output_dir)?;

    for (i, result) in results.iter().enumerate() {
        println!(
            "{} output {} ({}x{}): {:.2}s, {} scene(s), {} cache hit(s), {} cache miss(es)",
            "compiled".green().bold(),
            i,
            result.project.output.width,
            result.project.output.height,
            result.metadata.total_duration,
            result.metadata.scene_timings.len(),
            result.metadata.cache_hits,
            result.metadata.cache_misses,
        );
    }
    Ok(())
}
