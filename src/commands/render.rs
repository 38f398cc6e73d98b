use colored::*;
use std::path::Path;
use teto::assets::LocalAssetResolver;
use teto::compiler::ScriptCompiler;
use teto::config::RenderSettings;
use teto::effects::EffectRegistry;
use teto::error::TetoResult;
use teto::media::FfmpegBackend;
use teto::parallel::ParallelDriver;
use teto::render::{self, RenderContext};
use teto::script::Script;
use teto::tts::cache::TtsCache;
use teto::tts::mock::MockProvider;

pub fn run(
    script_path: &Path,
    output_dir: &Path,
    max_workers: Option<usize>,
    verbose: bool,
) -> TetoResult<()> {
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

    let mut settings = RenderSettings::default();
    if let Some(workers) = max_workers {
        settings.max_workers = workers.max(1);
    }
    settings.verbose = verbose;

    let driver = ParallelDriver::new(settings.max_workers);
    let jobs: Vec<_> = results
        .into_iter()
        .map(|result| {
            let effects = effects.clone();
            move || -> TetoResult<std::path::PathBuf> {
                let path = result.project.output.path.clone();
                let pipeline = render::default_pipeline(Box::new(FfmpegBackend));
                let mut ctx = RenderContext::new(&result.project, &effects);
                ctx.verbose = settings.verbose;
                render::run_pipeline(&pipeline, &mut ctx)?;
                Ok(path)
            }
        })
        .collect();

    for outcome in driver.run(jobs) {
        match outcome {
            Ok(path) => println!("{} {}", "rendered".green().bold(), path.display()),
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                if let Some(hint) = e.hint() {
                    eprintln!("{} {}", "hint:".yellow().bold(), hint);
                }
            }
        }
    }
    Ok(())
}
