//! Deploy one Azure Policy set (initiative) definition.
//!
//! `{token}` placeholders in the file are replaced before it is parsed, so one file can be
//! deployed to several management groups.  Anything other than a policy set definition ends the
//! run without deploying.

use arrrg::CommandLine;

use policydeploy::cli::{
    arm_client, exit_with, init_logging, print_json, run_set_definition, SetDefinitionRequest,
};
use policydeploy::{AzureCli, TerminalPrompt};

#[derive(Clone, Default, Debug, Eq, PartialEq, arrrg_derive::CommandLine)]
struct Args {
    #[arrrg(optional, "JSON object mapping placeholder tokens to replacement strings")]
    placeholders: Option<String>,
    #[arrrg(optional, "Subscription id (GUID) to create the definition in")]
    subscription_id: Option<String>,
    #[arrrg(optional, "Management group name to create the definition in")]
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
        "USAGE: policydeploy-set-definition [OPTIONS] <definition.json>",
    );
    init_logging(args.verbose);

    let request = SetDefinitionRequest {
        files: free,
        placeholders: args.placeholders,
        subscription_id: args.subscription_id,
        management_group: args.management_group,
        silent: args.silent,
    };
    let endpoint = args.arm_endpoint;
    match run_set_definition(request, &AzureCli::default(), &mut TerminalPrompt, |azure| {
        arm_client(azure, endpoint.as_deref())
    })
    .await
    {
        Ok(result) => print_json(&result),
        Err(err) => exit_with(err),
    }
}
