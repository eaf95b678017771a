use anyhow::{Result, anyhow};

use crate::output::print_json;
use crate::{CliContext, RepoCmd, split_owner_repo};

pub(crate) fn run_repo(ctx: &CliContext, cmd: RepoCmd) -> Result<()> {
    match cmd {
        RepoCmd::Attach {
            repo,
            branch,
            base_path,
        } => {
            let (owner, name) = split_owner_repo(&repo)?;
            let branch = branch.unwrap_or_else(|| ctx.cfg.host.default_branch.clone());
            let attached = ctx
                .store
                .attach_repository(
                    &owner,
                    &name,
                    &branch,
                    base_path.as_deref(),
                    ctx.cfg.limits.max_repositories,
                )?
                .ok_or_else(|| {
                    anyhow!(
                        "repository limit reached ({} attached)",
                        ctx.cfg.limits.max_repositories
                    )
                })?;
            ctx.observer.record("repo.attach", &attached.full_name())?;
            if ctx.json {
                print_json(&attached)?;
            } else {
                println!("attached {} ({})", attached.full_name(), attached.repo_id);
            }
            Ok(())
        }
        RepoCmd::List => {
            let repos = ctx.store.list_repositories()?;
            if ctx.json {
                print_json(&repos)?;
            } else if repos.is_empty() {
                println!("no repositories attached");
            } else {
                for repo in repos {
                    println!(
                        "{}  branch={}  base_path={}",
                        repo.full_name(),
                        repo.default_branch,
                        repo.base_path.as_deref().unwrap_or("/")
                    );
                }
            }
            Ok(())
        }
    }
}
