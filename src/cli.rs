// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn id_arg() -> Arg {
    Arg::new("id").long("id").required(true).help("Agreement id")
}

fn number_arg() -> Arg {
    Arg::new("number")
        .long("number")
        .required(true)
        .value_parser(clap::value_parser!(u32).range(1..))
        .help("Installment number (1-based)")
}

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn policy_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("discount")
            .long("discount")
            .help("Base discount percent (defaults to the default_discount setting)"),
    )
    .arg(
        Arg::new("apply_to_total")
            .long("apply-to-total")
            .action(ArgAction::SetTrue)
            .help("Discount the whole installment instead of its interest share"),
    )
    .arg(
        Arg::new("flat")
            .long("flat")
            .action(ArgAction::SetTrue)
            .help("Use the discount as-is instead of the progressive tier"),
    )
}

pub fn build_cli() -> Command {
    Command::new("debtclip")
        .version(crate_version!())
        .about("Debt-repayment agreements: charges, installment plans, lifecycle")
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(policy_args(json_flags(
            Command::new("simulate")
                .about("Preview charges and an installment plan without saving")
                .arg(Arg::new("principal").long("principal").required(true))
                .arg(Arg::new("interest").long("interest").help("Monthly interest percent"))
                .arg(Arg::new("penalty").long("penalty").help("Penalty percent"))
                .arg(Arg::new("count").long("count").default_value("1")),
        )))
        .subcommand(json_flags(
            Command::new("tiers")
                .about("Show the progressive discount tiers for a base percent")
                .arg(Arg::new("discount").long("discount").required(true)),
        ))
        .subcommand(
            Command::new("agreement")
                .about("Create and track agreements")
                .subcommand(
                    Command::new("create")
                        .arg(Arg::new("contract").long("contract").required(true))
                        .arg(Arg::new("creditor").long("creditor").required(true))
                        .arg(Arg::new("creditor_doc").long("creditor-doc").required(true))
                        .arg(Arg::new("creditor_email").long("creditor-email"))
                        .arg(Arg::new("debtor").long("debtor").required(true))
                        .arg(Arg::new("debtor_doc").long("debtor-doc").required(true))
                        .arg(Arg::new("debtor_email").long("debtor-email"))
                        .arg(Arg::new("property").long("property").required(true))
                        .arg(Arg::new("cep").long("cep"))
                        .arg(Arg::new("city").long("city"))
                        .arg(Arg::new("state").long("state"))
                        .arg(Arg::new("principal").long("principal").required(true))
                        .arg(Arg::new("interest").long("interest"))
                        .arg(Arg::new("penalty").long("penalty"))
                        .arg(Arg::new("period").long("period"))
                        .arg(Arg::new("agency").long("agency"))
                        .arg(Arg::new("agency_address").long("agency-address"))
                        .arg(Arg::new("agency_cnpj").long("agency-cnpj"))
                        .arg(Arg::new("broker").long("broker"))
                        .arg(Arg::new("creci").long("creci"))
                        .arg(Arg::new("ip").long("ip").help("Originating IP, as seen by the caller")),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(Arg::new("status").long("status")),
                ))
                .subcommand(json_flags(Command::new("show").arg(id_arg())))
                .subcommand(Command::new("send").arg(id_arg()))
                .subcommand(
                    Command::new("sign")
                        .arg(id_arg())
                        .arg(Arg::new("signed_by").long("signed-by"))
                        .arg(Arg::new("option").long("option").help("Accepted payment method")),
                )
                .subcommand(Command::new("pay").arg(id_arg()))
                .subcommand(Command::new("rm").arg(id_arg())),
        )
        .subcommand(
            Command::new("plan")
                .about("Build and edit an agreement's installment plan")
                .subcommand(policy_args(
                    Command::new("generate")
                        .arg(id_arg())
                        .arg(Arg::new("count").long("count").required(true))
                        .arg(
                            Arg::new("method")
                                .long("method")
                                .action(ArgAction::Append)
                                .help("Payment method offered (pix|boleto|card|link); repeatable"),
                        ),
                ))
                .subcommand(
                    Command::new("redistribute")
                        .arg(id_arg())
                        .arg(Arg::new("count").long("count").required(true)),
                )
                .subcommand(Command::new("add").arg(id_arg()))
                .subcommand(Command::new("rm").arg(id_arg()).arg(number_arg()))
                .subcommand(
                    Command::new("override")
                        .arg(id_arg())
                        .arg(number_arg())
                        .arg(Arg::new("field").long("field").required(true))
                        .arg(Arg::new("value").long("value").required(true)),
                )
                .subcommand(
                    Command::new("reschedule")
                        .arg(id_arg())
                        .arg(number_arg())
                        .arg(Arg::new("date").long("date").required(true)),
                )
                .subcommand(json_flags(Command::new("validate").arg(id_arg()))),
        )
        .subcommand(
            Command::new("verify")
                .about("Look up an agreement by its SHA-256 content hash")
                .arg(Arg::new("hash").long("hash").required(true)),
        )
        .subcommand(
            Command::new("export")
                .about("Export an agreement's ledger")
                .arg(id_arg())
                .arg(Arg::new("format").long("format").default_value("csv"))
                .arg(Arg::new("out").long("out").required(true)),
        )
        .subcommand(
            Command::new("settings")
                .about("Read or change runtime defaults")
                .subcommand(Command::new("list"))
                .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                ),
        )
}
