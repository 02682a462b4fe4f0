//! Runs the parsed command and reports through the [`Logger`]

use crate::cli::args::{Args, ChecksArgs, Command, InspectArgs};
use crate::config::ToolConfig;
use crate::error::AppError;
use crate::image::{Image, ImageOptions};
use crate::loader::CheckLoader;
use crate::logging::Logger;
use crate::process::SystemRunner;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, AppError>;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate().map_err(AppError::Validation)?;
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };
        Ok(Self { args, output })
    }

    pub fn run(&self) -> Result<()> {
        let result = match &self.args.command {
            Command::Checks(checks) => self.list_checks(checks),
            Command::Inspect(inspect) => self.inspect(inspect),
        };
        match &result {
            Ok(()) => self.output.success(&format!(
                "Done in {}",
                self.output.format_duration(self.output.elapsed())
            )),
            Err(e) => self.output.error(&e.to_string()),
        }
        result
    }

    fn list_checks(&self, args: &ChecksArgs) -> Result<()> {
        self.output.section("Check discovery");
        let mut loader = CheckLoader::new(args.paths.iter().cloned())?;
        let checks = loader.check_classes()?;

        let lines: Vec<String> = checks
            .iter()
            .map(|check| format!("{} ({})", check.name, check.id()))
            .collect();
        self.output.list("Checks", &lines);
        for check in &checks {
            if let Some(message) = &check.fields().message {
                self.output.detail(&format!("{}: {}", check.name, message));
            }
        }
        self.output
            .info(&format!("{} checks found in {} directories", checks.len(), args.paths.len()));
        Ok(())
    }

    fn inspect(&self, args: &InspectArgs) -> Result<()> {
        self.output.section("Image inspection");
        let options = ImageOptions {
            pull: args.pull,
            insecure: args.insecure,
            archive: args.archive,
        };
        let mut image = Image::new(&args.target, options, ToolConfig::from_env(), Arc::new(SystemRunner))?;
        self.output
            .detail(&format!("Staging in {}", image.staging_root().display()));

        let result = self.report(&mut image, args);
        if args.keep {
            self.output
                .warning(&format!("Keeping {}", image.staging_root().display()));
        } else if let Err(e) = image.teardown() {
            // The report's own failure takes precedence.
            if result.is_ok() {
                return Err(e.into());
            }
            self.output.warning(&format!("Teardown failed: {}", e));
        }
        result
    }

    fn report(&self, image: &mut Image, args: &InspectArgs) -> Result<()> {
        self.output.step(&format!("Acquiring {}", args.target));
        let staged = image.acquire()?;

        let mut summary = vec![
            ("Name", staged.name.clone()),
            ("Config", staged.config_digest()),
        ];
        if let Some(os) = &staged.config.os {
            summary.push(("OS", os.clone()));
        }
        if let Some(arch) = &staged.config.architecture {
            summary.push(("Architecture", arch.clone()));
        }
        self.output.summary_kv("Image", &summary);

        let mut labels: Vec<String> = staged
            .labels()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        labels.sort();
        self.output.list("Labels", &labels);

        if args.files.is_empty() {
            return Ok(());
        }
        self.output.subsection("Files");
        for file in &args.files {
            match image.file_exists(file) {
                Ok(true) => self.output.success(&format!("{} present", file)),
                Ok(false) => self.output.warning(&format!("{} missing", file)),
                Err(e) => self.output.warning(&e.to_string()),
            }
        }
        Ok(())
    }
}
