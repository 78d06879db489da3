pub mod loaders;
pub mod paths;
pub mod quiz;
pub mod response;
pub mod student;

pub use loaders::{load_seed_file, load_seed_files, SeedFile};
pub use paths::DocRoute;
pub use quiz::{Question, Quiz};
pub use response::{ParsedQuizResponse, QuestionGrade, QuizGrade, QuizResponse};
pub use student::Student;
