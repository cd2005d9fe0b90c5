use course_core::grading::PassingPolicy;
use course_core::model::{
    Chapter, ChapterId, ContentKind, ExamDraft, Module, ModuleId, QuestionDraft, QuestionKind,
    StudentId, Subject, SubjectId,
};
use course_core::time::fixed_now;
use services::{AppServices, AuthoringMode, Clock, ExamSessionError};
use storage::repository::{CourseRepository, Storage};

async fn seed_course(storage: &Storage) {
    storage
        .courses
        .upsert_subject(&Subject::new(SubjectId::new(1), "Chemistry").unwrap())
        .await
        .unwrap();
    for (module, position) in [(1, 1), (2, 2)] {
        storage
            .courses
            .upsert_module(&Module {
                id: ModuleId::new(module),
                subject_id: SubjectId::new(1),
                title: format!("Module {module}"),
                position,
                published: true,
            })
            .await
            .unwrap();
        for n in 1..=2 {
            storage
                .courses
                .upsert_chapter(&Chapter {
                    id: ChapterId::new(module * 10 + n),
                    module_id: ModuleId::new(module),
                    title: format!("Chapter {module}.{n}"),
                    position: u32::try_from(n).unwrap(),
                    content: ContentKind::Video,
                    published: true,
                })
                .await
                .unwrap();
        }
    }
}

fn four_question_draft() -> ExamDraft {
    let mut draft = ExamDraft::new("Elements");
    for n in 1..=4 {
        let mut q = QuestionDraft::new(QuestionKind::MultipleChoice);
        q.set_text(format!("Question {n}"));
        for i in 0..q.option_count() {
            q.set_option_text(i, format!("Answer {i}"));
        }
        q.mark_correct(0);
        draft.push_question(q);
    }
    draft
}

async fn services(name: &str, max_attempts: Option<u32>) -> AppServices {
    let storage = Storage::sqlite(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    seed_course(&storage).await;
    AppServices::with_storage(
        storage,
        Clock::fixed(fixed_now()),
        PassingPolicy::new(70).unwrap(),
        max_attempts,
    )
}

#[tokio::test]
async fn three_of_four_correct_scores_seventy_five() {
    let app = services("memdb_exam_flow_score", None).await;
    let exam = app
        .authoring()
        .save(
            AuthoringMode::Create {
                module_id: ModuleId::new(1),
            },
            &four_question_draft(),
        )
        .await
        .expect("create exam");

    let student = StudentId::new(3);
    let exams = app.exams();
    let mut attempt = exams
        .start_attempt(student, ModuleId::new(1))
        .await
        .expect("start attempt");

    let questions = exam.questions().to_vec();
    for question in &questions[..3] {
        assert!(attempt.choose(question.id, question.options[0].id));
    }
    let err = exams.submit(&mut attempt).await.unwrap_err();
    assert!(matches!(
        err,
        ExamSessionError::Incomplete { ref missing } if missing == &vec![questions[3].id]
    ));

    // an option of another question does not answer this one
    assert!(!attempt.choose(questions[3].id, questions[0].options[1].id));
    assert!(attempt.choose(questions[3].id, questions[3].options[2].id));
    assert!(attempt.is_complete());

    let result = exams.submit(&mut attempt).await.expect("submit");
    assert_eq!(result.score(), 75);
    assert_eq!(result.correct_answers(), 3);
    assert_eq!(result.total_questions(), 4);
    assert!(result.passed());
    assert_eq!(result.attempt(), 1);

    assert!(matches!(
        exams.submit(&mut attempt).await.unwrap_err(),
        ExamSessionError::AlreadySubmitted
    ));
    assert!(!attempt.choose(questions[0].id, questions[0].options[1].id));

    let history = exams.history(student, exam.id()).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn retakes_append_until_the_limit() {
    let app = services("memdb_exam_flow_retakes", Some(2)).await;
    let exam = app
        .authoring()
        .save(
            AuthoringMode::Create {
                module_id: ModuleId::new(1),
            },
            &four_question_draft(),
        )
        .await
        .unwrap();
    let exams = app.exams();
    let student = StudentId::new(1);

    let mut first = exams.start_attempt(student, ModuleId::new(1)).await.unwrap();
    for question in exam.questions() {
        first.choose(question.id, question.options[1].id);
    }
    let failed = exams.submit(&mut first).await.unwrap();
    assert_eq!(failed.score(), 0);
    assert!(!failed.passed());

    let mut second = exams.start_attempt(student, ModuleId::new(1)).await.unwrap();
    for question in exam.questions() {
        second.choose(question.id, question.options[0].id);
    }
    let passed = exams.submit(&mut second).await.unwrap();
    assert_eq!(passed.attempt(), 2);
    assert_eq!(passed.score(), 100);

    assert!(matches!(
        exams.start_attempt(student, ModuleId::new(1)).await.unwrap_err(),
        ExamSessionError::RetakeLimitReached { max: 2 }
    ));

    let best = exams.best_result(student, exam.id()).await.unwrap().unwrap();
    assert_eq!(best.attempt(), 2);
    let attempts: Vec<_> = exams
        .history(student, exam.id())
        .await
        .unwrap()
        .iter()
        .map(|r| r.attempt())
        .collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[tokio::test]
async fn exams_appear_as_modules_are_reached() {
    let app = services("memdb_exam_flow_available", None).await;
    for module in [1, 2] {
        app.authoring()
            .save(
                AuthoringMode::Create {
                    module_id: ModuleId::new(module),
                },
                &four_question_draft(),
            )
            .await
            .unwrap();
    }
    let student = StudentId::new(8);
    let exams = app.exams();

    let available = exams.available_exams(student, SubjectId::new(1)).await.unwrap();
    let modules: Vec<_> = available.iter().map(|e| e.module_id().value()).collect();
    assert_eq!(modules, vec![1]);

    let progress = app.progress();
    progress.complete_chapter(student, ChapterId::new(11)).await.unwrap();
    progress.complete_chapter(student, ChapterId::new(12)).await.unwrap();

    let available = exams.available_exams(student, SubjectId::new(1)).await.unwrap();
    let modules: Vec<_> = available.iter().map(|e| e.module_id().value()).collect();
    assert_eq!(modules, vec![1, 2]);

    assert!(
        exams
            .available_exams(student, SubjectId::new(99))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn module_without_exam_cannot_be_started() {
    let app = services("memdb_exam_flow_none", None).await;
    let err = app
        .exams()
        .start_attempt(StudentId::new(1), ModuleId::new(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ExamSessionError::NoExam(m) if m == ModuleId::new(2)));
}
