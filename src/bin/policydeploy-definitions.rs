//! Deploy Azure Policy definitions in bulk.
//!
//! Files that are not policy definitions are skipped with a warning; the results of the
//! successful deployments are printed to stdout as a JSON array.

use arrrg::CommandLine;

use policydeploy::cli::{
    arm_client, exit_with, init_logging, print_json, run_definitions, DefinitionsRequest,
};
use policydeploy::{AzureCli, TerminalPrompt};

#[derive(Clone, Default, Debug, Eq, PartialEq, arrrg_derive::CommandLine)]
struct Args {
    #[arrrg(optional, "Deploy every *.json file in this directory")]
    directory: Option<String>,
    #[arrrg(flag, "Also search subdirectories of --directory")]
    recursive: bool,
    #[arrrg(optional, "Subscription id (GUID) to create the definitions in")]
    subscription_id: Option<String>,
    #[arrrg(optional, "Management group name to create the definitions in")]
    management_group: Option<String>,
    #[arrrg(flag, "Fail instead of prompting when not signed in")]
    silent: bool,
    #[arrrg(optional, "Azure Resource Manager endpoint (defaults to the public cloud)")]
    arm_endpoint: Option<String>,
    #[arrrg(flag, "Log request details")]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let (args, free) = Args::from_command_line_relaxed(
        "USAGE: policydeploy-definitions [OPTIONS] [definition.json...]",
    );
    init_logging(args.verbose);

    let request = DefinitionsRequest {
        files: free,
        directory: args.directory,
        recursive: args.recursive,
        subscription_id: args.subscription_id,
        management_group: args.management_group,
        silent: args.silent,
    };
    let endpoint = args.arm_endpoint;
    let report = run_definitions(request, &AzureCli::default(), &mut TerminalPrompt, |azure| {
        arm_client(azure, endpoint.as_deref())
    })
    .await
    .unwrap_or_else(|err| exit_with(err));
    print_json(&report.results);
    if !report.succeeded() {
        exit_with(format!(
            "{} of {} definitions failed to deploy",
            report.failed.len(),
            report.failed.len() + report.results.len()
        ));
    }
}
