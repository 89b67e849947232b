// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use debtclip::{cli, commands, db, store};
use debtclip::models::{AgreementRecord, AgreementStatus, PaymentMethod};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn run(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let argv = std::iter::once("debtclip").chain(args.iter().copied());
    let matches = cli::build_cli().try_get_matches_from(argv)?;
    match matches.subcommand() {
        Some(("agreement", m)) => commands::agreements::handle(conn, m),
        Some(("plan", m)) => commands::plans::handle(conn, m),
        Some(("export", m)) => commands::exporter::handle(conn, m),
        Some(("settings", m)) => commands::settings::handle(conn, m),
        Some(("verify", m)) => commands::verify::handle(conn, m),
        _ => panic!("unexpected subcommand"),
    }
}

fn create(conn: &mut Connection, extra: &[&str]) -> anyhow::Result<AgreementRecord> {
    let mut args = vec![
        "debtclip",
        "agreement",
        "create",
        "--contract",
        "cont-2025-001 ",
        "--creditor",
        "Carlos",
        "--creditor-doc",
        "52998224725",
        "--debtor",
        "Diana",
        "--debtor-doc",
        "111.444.777-35",
        "--property",
        "Rua das Flores, 12",
        "--principal",
        "6000",
    ];
    args.extend_from_slice(extra);
    let matches = cli::build_cli().get_matches_from(args);
    if let Some(("agreement", m)) = matches.subcommand() {
        if let Some(("create", sub)) = m.subcommand() {
            return commands::agreements::create(conn, sub);
        }
    }
    panic!("agreement create not parsed")
}

#[test]
fn create_uses_defaults_and_normalizes_documents() {
    let mut conn = db::open_in_memory().unwrap();
    let record = create(&mut conn, &["--cep", "01310100", "--state", "sp"]).unwrap();

    assert_eq!(record.status, AgreementStatus::Draft);
    assert_eq!(record.contract_id, "CONT-2025-001");
    assert_eq!(record.parties.creditor_cpf_cnpj, "529.982.247-25");
    assert_eq!(record.property.cep.as_deref(), Some("01310-100"));
    assert_eq!(record.property.state.as_deref(), Some("SP"));
    assert_eq!(record.debt.interest_rate_percent, Decimal::from(2));
    assert_eq!(record.debt.penalty_rate_percent, Decimal::from(10));
    assert!(record.token.as_deref().unwrap().starts_with("MR3X-ACD-"));
    assert_eq!(store::require(&conn, &record.id).unwrap(), record);
}

#[test]
fn create_rejects_invalid_documents() {
    let mut conn = db::open_in_memory().unwrap();
    assert!(create(&mut conn, &["--agency-cnpj", "11.222.333/0001-80"]).is_err());
    assert!(create(&mut conn, &["--creci", "12"]).is_err());
    assert!(create(&mut conn, &["--cep", "123"]).is_err());
    assert!(create(&mut conn, &["--interest=-1"]).is_err());
    assert!(store::list(&conn, None).unwrap().is_empty());

    let err = run(
        &mut conn,
        &[
            "agreement", "create", "--contract", "C-1", "--creditor", "Carlos",
            "--creditor-doc", "529.982.247-24", "--debtor", "Diana",
            "--debtor-doc", "111.444.777-35", "--property", "Rua", "--principal", "10",
        ],
    )
    .unwrap_err();
    assert!(err.to_string().contains("creditor"));
}

#[test]
fn plan_generate_and_edit_flow() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;

    run(
        &mut conn,
        &[
            "plan", "generate", "--id", &id, "--count", "2", "--discount", "50",
            "--method", "pix", "--method", "card",
        ],
    )
    .unwrap();
    let record = store::require(&conn, &id).unwrap();
    assert_eq!(record.installment_plans.len(), 2);
    assert!(record
        .installment_plans
        .iter()
        .all(|e| e.final_value == Decimal::from(3336)));
    assert_eq!(record.payment_options.len(), 2);
    assert_eq!(record.payment_options[1].method, PaymentMethod::Card);
    assert_eq!(record.payment_options[0].total_value, Decimal::from(6672));
    let settings = record.plan_settings.clone().unwrap();
    assert_eq!(settings.discount_percent, Decimal::from(50));
    assert!(settings.progressive);

    run(
        &mut conn,
        &["plan", "override", "--id", &id, "--number", "1", "--field", "value", "--value", "3400"],
    )
    .unwrap();
    let record = store::require(&conn, &id).unwrap();
    assert_eq!(record.installment_plans[0].base_value, Decimal::from(3400));
    assert_eq!(record.installment_plans[1].final_value, Decimal::from(3336));
    run(&mut conn, &["plan", "validate", "--id", &id, "--json"]).unwrap();

    run(&mut conn, &["plan", "redistribute", "--id", &id, "--count", "3"]).unwrap();
    let record = store::require(&conn, &id).unwrap();
    assert_eq!(record.installment_plans.len(), 3);
    assert_eq!(record.installment_plans[2].base_value, Decimal::from(2240));
    assert_eq!(record.installment_plans[0].discount_percent, Decimal::from(30));
    assert_eq!(record.payment_options.len(), 2);
    assert_eq!(record.payment_options[0].installments, 3);

    run(&mut conn, &["plan", "rm", "--id", &id, "--number", "2"]).unwrap();
    let record = store::require(&conn, &id).unwrap();
    let numbers: Vec<u32> = record
        .installment_plans
        .iter()
        .map(|e| e.installment_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    assert!(run(&mut conn, &["plan", "rm", "--id", &id, "--number", "9"]).is_err());
    assert!(run(&mut conn, &["plan", "override", "--id", &id, "--number", "1", "--field", "due", "--value", "1"]).is_err());
}

#[test]
fn plan_edits_require_a_draft_with_a_plan() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;

    let err = run(&mut conn, &["plan", "add", "--id", &id]).unwrap_err();
    assert!(err.to_string().contains("plan generate"));
    assert!(run(&mut conn, &["plan", "generate", "--id", &id, "--count", "0"]).is_err());

    run(&mut conn, &["plan", "generate", "--id", &id, "--count", "1"]).unwrap();
    run(&mut conn, &["agreement", "send", "--id", &id]).unwrap();
    let err = run(&mut conn, &["plan", "add", "--id", &id]).unwrap_err();
    assert!(err.to_string().contains("draft"));
}

#[test]
fn sign_records_the_accepted_option() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;
    run(&mut conn, &["plan", "generate", "--id", &id, "--count", "1", "--method", "pix"]).unwrap();

    assert!(run(&mut conn, &["agreement", "sign", "--id", &id]).is_err());
    run(&mut conn, &["agreement", "send", "--id", &id]).unwrap();
    assert!(run(&mut conn, &["agreement", "sign", "--id", &id, "--option", "boleto"]).is_err());
    run(
        &mut conn,
        &["agreement", "sign", "--id", &id, "--option", "pix", "--signed-by", "Diana Souza"],
    )
    .unwrap();

    let record = store::require(&conn, &id).unwrap();
    assert_eq!(record.status, AgreementStatus::Signed);
    assert_eq!(record.integrity.signed_by.as_deref(), Some("Diana Souza"));
    assert_eq!(record.tenant_accepted_option.as_deref(), Some("pix"));

    let hash = record.integrity.content_hash.clone();
    run(&mut conn, &["verify", "--hash", &hash]).unwrap();
    run(&mut conn, &["agreement", "pay", "--id", &id]).unwrap();
    run(&mut conn, &["agreement", "rm", "--id", &id]).unwrap();
    assert!(run(&mut conn, &["agreement", "rm", "--id", &id]).is_err());
}

#[test]
fn export_csv_and_json() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;
    run(
        &mut conn,
        &["plan", "generate", "--id", &id, "--count", "2", "--discount", "50"],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("plan.csv");
    run(
        &mut conn,
        &["export", "--id", &id, "--out", csv_path.to_str().unwrap()],
    )
    .unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("installment,value,discount_percent"));
    assert!(lines[1].starts_with("1,3360.00,40,24.00,3336.00,"));
    assert!(lines[3].starts_with("total,6720.00,"));
    assert!(lines[3].contains(",48.00,6672.00,"));

    let json_path = dir.path().join("plan.json");
    run(
        &mut conn,
        &["export", "--id", &id, "--format", "JSON", "--out", json_path.to_str().unwrap()],
    )
    .unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(doc["id"], id.as_str());
    assert_eq!(doc["status"], "draft");
    assert_eq!(doc["installments"].as_array().unwrap().len(), 2);

    let bad = dir.path().join("plan.xml");
    assert!(run(
        &mut conn,
        &["export", "--id", &id, "--format", "xml", "--out", bad.to_str().unwrap()],
    )
    .is_err());
    assert!(!bad.exists());
}

#[test]
fn settings_feed_new_agreements() {
    let mut conn = db::open_in_memory().unwrap();
    run(&mut conn, &["settings", "set", "default_interest_rate", "3"]).unwrap();
    assert!(run(&mut conn, &["settings", "set", "default_penalty_rate", "-1"]).is_err());
    assert!(run(&mut conn, &["settings", "set", "apply_to_total", "maybe"]).is_err());
    assert!(run(&mut conn, &["settings", "get", "nope"]).is_err());
    run(&mut conn, &["settings", "list"]).unwrap();

    let record = create(&mut conn, &[]).unwrap();
    assert_eq!(record.debt.interest_rate_percent, Decimal::from(3));
    assert_eq!(record.debt.penalty_rate_percent, Decimal::from(10));
}

#[test]
fn overflowing_amounts_are_rejected_without_saving() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;
    run(&mut conn, &["plan", "generate", "--id", &id, "--count", "2", "--method", "pix"]).unwrap();
    let before = store::require(&conn, &id).unwrap();

    let err = run(
        &mut conn,
        &[
            "plan", "override", "--id", &id, "--number", "1", "--field", "value",
            "--value", "79228162514264337593543950335",
        ],
    )
    .unwrap_err();
    assert!(err.to_string().contains("overflows"));
    assert_eq!(store::require(&conn, &id).unwrap(), before);

    let matches = cli::build_cli().get_matches_from([
        "debtclip",
        "simulate",
        "--principal",
        "79228162514264337593543950335",
    ]);
    if let Some(("simulate", sub)) = matches.subcommand() {
        let err = commands::simulate::simulate(&conn, sub).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    } else {
        panic!("simulate not parsed");
    }
}

#[test]
fn repeated_methods_offer_one_option_each() {
    let mut conn = db::open_in_memory().unwrap();
    let id = create(&mut conn, &[]).unwrap().id;
    run(
        &mut conn,
        &[
            "plan", "generate", "--id", &id, "--count", "3", "--method", "pix",
            "--method", "pix", "--method", "card",
        ],
    )
    .unwrap();
    let record = store::require(&conn, &id).unwrap();
    let methods: Vec<PaymentMethod> = record.payment_options.iter().map(|o| o.method).collect();
    assert_eq!(methods, vec![PaymentMethod::Pix, PaymentMethod::Card]);
    assert_ne!(record.payment_options[0].id, record.payment_options[1].id);
}
